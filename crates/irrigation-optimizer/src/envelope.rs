use crate::types::{ChannelRegimeClass, DepthEnvelope};
use irrigation_core::{CanalSection, Config, Warning};
use irrigation_hydraulics::{conjugate_depth, critical_depth, froude, normal_depth};

/// Minimum-depth envelope for one section at a given flow (spec §4.4.2):
/// critical depth, normal depth, a sediment-transport minimum (the depth
/// achieving `v_min`), an operational minimum, and a recommended depth
/// that is the binding constraint across all of them.
pub fn depth_envelope(section: &CanalSection, flow_m3s: f64, config: &Config) -> DepthEnvelope {
    let normal = normal_depth(section, flow_m3s);
    let critical = critical_depth(section, flow_m3s);
    let sediment_min = sediment_transport_min_depth(section, flow_m3s, config.min_flow_velocity_ms);
    let operational_min = config.min_flow_depth_m;

    let recommended = (normal.max(1.1 * critical) * config.depth_safety_factor)
        .max(sediment_min)
        .max(operational_min);

    let fr = froude(section, normal, flow_m3s);
    let regime = if fr < 0.9 {
        ChannelRegimeClass::Subcritical
    } else if fr > 1.1 {
        ChannelRegimeClass::Supercritical
    } else {
        ChannelRegimeClass::Critical
    };

    // Conjugate depth is only meaningful downstream of a supercritical
    // reach; populate it here so a caller walking a channel's ordered
    // sections can flag a transition into a milder-sloped neighbor
    // without recomputing the momentum relation itself.
    let conjugate_depth_m = if matches!(regime, ChannelRegimeClass::Supercritical) {
        Some(conjugate_depth(normal, fr))
    } else {
        None
    };

    DepthEnvelope {
        section_id: section.id.clone(),
        critical_depth_m: critical,
        normal_depth_m: normal,
        sediment_min_depth_m: sediment_min,
        operational_min_depth_m: operational_min,
        recommended_depth_m: recommended,
        froude: fr,
        regime,
        conjugate_depth_m,
    }
}

/// Depth at which cross-sectional average velocity equals `v_min`, found
/// by bisection on the (monotone increasing) area-vs-depth relation.
fn sediment_transport_min_depth(section: &CanalSection, flow_m3s: f64, v_min: f64) -> f64 {
    if flow_m3s <= 0.0 || v_min <= 0.0 {
        return 0.0;
    }
    let target_area = flow_m3s / v_min;
    let mut lo = 0.0_f64;
    let mut hi = 50.0_f64;
    while section.cross_section.area(hi) < target_area && hi < 1e5 {
        hi *= 2.0;
    }
    for _ in 0..50 {
        let mid = (lo + hi) / 2.0;
        if section.cross_section.area(mid) < target_area {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    (lo + hi) / 2.0
}

/// Walks a channel's ordered section envelopes and flags a potential
/// hydraulic jump wherever a supercritical reach is immediately followed
/// by a subcritical (mild-slope) one (spec §4.4.2).
pub fn detect_hydraulic_jumps(envelopes: &[DepthEnvelope]) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for pair in envelopes.windows(2) {
        let (upstream, downstream) = (&pair[0], &pair[1]);
        if matches!(upstream.regime, ChannelRegimeClass::Supercritical)
            && matches!(downstream.regime, ChannelRegimeClass::Subcritical)
        {
            if let Some(conjugate) = upstream.conjugate_depth_m {
                warnings.push(Warning::new(
                    "hydraulic_jump",
                    format!(
                        "potential hydraulic jump between {} and {}: conjugate depth {:.3} m",
                        upstream.section_id, downstream.section_id, conjugate
                    ),
                ));
            }
        }
    }
    warnings
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
    fn recommended_depth_dominates_all_floors() {
        let section = test_section();
        let config = Config::default();
        let envelope = depth_envelope(&section, 5.0, &config);
        assert!(envelope.recommended_depth_m >= envelope.normal_depth_m * config.depth_safety_factor - 1e-6);
        assert!(envelope.recommended_depth_m >= envelope.sediment_min_depth_m);
        assert!(envelope.recommended_depth_m >= envelope.operational_min_depth_m);
    }
}
