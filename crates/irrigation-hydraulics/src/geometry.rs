use irrigation_core::{CanalSection, GRAVITY_MS2};

/// Minimum bed/energy slope the solver and the optimizer's depth
/// calculations fall back to, matching spec §4.3's "adverse energy slope"
/// policy: a canal section never gets assigned a slope below this, so a
/// flat or slightly adverse reach still resolves to a positive velocity.
pub const MIN_SLOPE: f64 = 1e-4;

/// Manning-uniform-flow normal depth for `flow_m3s` in `section`, found by
/// Newton iteration on `Q(y) = (1/n)*A(y)^(5/3)/P(y)^(2/3)*sqrt(S)` (spec
/// §4.4.2). Falls back to a bisection step whenever the Newton step would
/// leave the physically valid `y > 0` region.
pub fn normal_depth(section: &CanalSection, flow_m3s: f64) -> f64 {
    if flow_m3s <= 0.0 {
        return 0.0;
    }
    let slope = section.bed_slope.max(MIN_SLOPE);
    let q = |y: f64| -> f64 {
        let area = section.cross_section.area(y);
        let perimeter = section.cross_section.wetted_perimeter(y);
        if area <= 0.0 || perimeter <= 0.0 {
            return 0.0;
        }
        (1.0 / section.manning_n) * area.powf(5.0 / 3.0) / perimeter.powf(2.0 / 3.0) * slope.sqrt()
    };

    let mut lo = 1e-6;
    let mut hi = 50.0_f64;
    // Expand hi until it brackets the target flow (Manning discharge is
    // monotonically increasing in depth for a trapezoidal section).
    while q(hi) < flow_m3s && hi < 1e5 {
        hi *= 2.0;
    }
    let mut y = (lo + hi) / 2.0;
    for _ in 0..60 {
        let residual = q(y) - flow_m3s;
        if residual.abs() < 1e-9 {
            break;
        }
        if residual > 0.0 {
            hi = y;
        } else {
            lo = y;
        }
        y = (lo + hi) / 2.0;
    }
    y
}

/// Critical depth solving `Q^2/g = A(y)^3 / T(y)` on the trapezoidal form
/// (spec §4.4.2), by bisection (the specific-energy function is monotone
/// in the physically valid range).
pub fn critical_depth(section: &CanalSection, flow_m3s: f64) -> f64 {
    if flow_m3s <= 0.0 {
        return 0.0;
    }
    let f = |y: f64| -> f64 {
        let area = section.cross_section.area(y);
        let top_width = section.cross_section.top_width(y);
        if top_width <= 0.0 {
            return f64::NEG_INFINITY;
        }
        area.powi(3) / top_width - (flow_m3s * flow_m3s) / GRAVITY_MS2
    };
    let mut lo = 1e-6;
    let mut hi = 50.0_f64;
    while f(hi) < 0.0 && hi < 1e5 {
        hi *= 2.0;
    }
    for _ in 0..60 {
        let mid = (lo + hi) / 2.0;
        if f(mid) < 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

pub fn velocity_at_depth(section: &CanalSection, depth_m: f64, flow_m3s: f64) -> f64 {
    let area = section.cross_section.area(depth_m);
    if area > 1e-9 {
        flow_m3s / area
    } else {
        0.0
    }
}

/// `Fr = V / sqrt(g * D)`, with hydraulic depth `D = A/T` for a
/// non-rectangular section.
pub fn froude(section: &CanalSection, depth_m: f64, flow_m3s: f64) -> f64 {
    let top_width = section.cross_section.top_width(depth_m);
    let area = section.cross_section.area(depth_m);
    if top_width <= 0.0 || area <= 0.0 {
        return 0.0;
    }
    let hydraulic_depth = area / top_width;
    let velocity = velocity_at_depth(section, depth_m, flow_m3s);
    velocity / (GRAVITY_MS2 * hydraulic_depth).sqrt()
}

/// Conjugate (sequent) depth downstream of a hydraulic jump:
/// `y2 = y1/2 * (sqrt(1 + 8*Fr1^2) - 1)` (spec §4.4.2).
pub fn conjugate_depth(y1_m: f64, fr1: f64) -> f64 {
    (y1_m / 2.0) * ((1.0 + 8.0 * fr1 * fr1).sqrt() - 1.0)
}

/// Friction-slope energy loss over a section's length at the given flow,
/// used by the elevation feasibility walk (spec §4.4.1): Manning energy
/// slope `S_f` evaluated at normal depth, clipped to [`MIN_SLOPE`].
pub fn friction_loss_m(section: &CanalSection, flow_m3s: f64) -> f64 {
    let depth = normal_depth(section, flow_m3s);
    let radius = section.cross_section.hydraulic_radius(depth);
    if radius <= 0.0 {
        return section.length_m * MIN_SLOPE;
    }
    let velocity = velocity_at_depth(section, depth, flow_m3s);
    let s_f = if velocity > 0.0 {
        (velocity * section.manning_n / radius.powf(2.0 / 3.0)).powi(2)
    } else {
        MIN_SLOPE
    };
    s_f.max(MIN_SLOPE) * section.length_m
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_core::{CanalKind, ChannelId, NodeId, SectionId, TrapezoidalCrossSection};

    fn test_section() -> CanalSection {
        CanalSection {
            id: SectionId::from("s1"),
            channel_id: ChannelId::from("c1"),
            upstream_node: NodeId::from("n1"),
            downstream_node: NodeId::from("n2"),
            cross_section: TrapezoidalCrossSection {
                bottom_width_m: 3.0,
                side_slope: 1.5,
            },
            length_m: 1000.0,
            manning_n: 0.025,
            bed_slope: 0.0005,
            kind: CanalKind::Earthen,
        }
    }

    #[test]
    fn normal_depth_reproduces_manning_flow() {
        let section = test_section();
        let y = normal_depth(&section, 5.0);
        let area = section.cross_section.area(y);
        let radius = section.cross_section.hydraulic_radius(y);
        let q = (1.0 / section.manning_n) * area * radius.powf(2.0 / 3.0) * section.bed_slope.sqrt();
        assert!((q - 5.0).abs() < 1e-3, "recomputed Q {q} should match target 5.0");
    }

    #[test]
    fn critical_depth_satisfies_specific_energy_relation() {
        let section = test_section();
        let y = critical_depth(&section, 5.0);
        let area = section.cross_section.area(y);
        let top_width = section.cross_section.top_width(y);
        let lhs = area.powi(3) / top_width;
        let rhs = 5.0 * 5.0 / GRAVITY_MS2;
        assert!((lhs - rhs).abs() / rhs < 1e-3);
    }

    #[test]
    fn conjugate_depth_matches_momentum_relation() {
        // Known textbook pair: y1=0.5m, Fr1=3 -> y2 ~ 2.15 m.
        let y2 = conjugate_depth(0.5, 3.0);
        assert!((y2 - 2.15).abs() < 0.05);
    }
}
