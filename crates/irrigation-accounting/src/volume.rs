use chrono::{DateTime, Utc};
use irrigation_core::FlowSample;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationMethod {
    Trapezoidal,
    Simpson,
    Rectangular,
}

/// Trapezoidal flow-to-volume integration over a sorted trace (spec §4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeIntegrationResult {
    pub method_used: IntegrationMethod,
    pub total_volume_m3: f64,
    pub duration_s: f64,
    pub cumulative_m3: Vec<(DateTime<Utc>, f64)>,
}

fn sorted_trace(trace: &[FlowSample]) -> Vec<FlowSample> {
    let mut sorted = trace.to_vec();
    sorted.sort_by_key(|s| s.timestamp);
    sorted
}

fn interpolate(trace: &[FlowSample], at: DateTime<Utc>) -> f64 {
    if trace.is_empty() {
        return 0.0;
    }
    if at <= trace[0].timestamp {
        return trace[0].flow_m3s;
    }
    if at >= trace[trace.len() - 1].timestamp {
        return trace[trace.len() - 1].flow_m3s;
    }
    for pair in trace.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if at >= a.timestamp && at <= b.timestamp {
            let span = (b.timestamp - a.timestamp).num_milliseconds() as f64;
            if span <= 0.0 {
                return a.flow_m3s;
            }
            let frac = (at - a.timestamp).num_milliseconds() as f64 / span;
            return a.flow_m3s + (b.flow_m3s - a.flow_m3s) * frac;
        }
    }
    trace[trace.len() - 1].flow_m3s
}

/// Trapezoidal integration between two arbitrary points on `trace`,
/// interpolating the flow at each endpoint. Used both for the requested
/// integration method and, unconditionally, for the cumulative-interval
/// series regardless of which method produced `total_volume_m3`.
fn volume_between(trace: &[FlowSample], from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    if from >= to || trace.is_empty() {
        return 0.0;
    }
    let mut points: Vec<(DateTime<Utc>, f64)> = vec![(from, interpolate(trace, from))];
    for sample in trace {
        if sample.timestamp > from && sample.timestamp < to {
            points.push((sample.timestamp, sample.flow_m3s));
        }
    }
    points.push((to, interpolate(trace, to)));
    points.windows(2).fold(0.0, |acc, pair| {
        let (t0, q0) = pair[0];
        let (t1, q1) = pair[1];
        let dt_s = (t1 - t0).num_milliseconds() as f64 / 1000.0;
        acc + 0.5 * (q0 + q1) * dt_s
    })
}

fn trapezoidal_total(trace: &[FlowSample]) -> f64 {
    trace.windows(2).fold(0.0, |acc, pair| {
        let dt_s = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
        acc + 0.5 * (pair[0].flow_m3s + pair[1].flow_m3s) * dt_s
    })
}

fn rectangular_total(trace: &[FlowSample]) -> f64 {
    trace.windows(2).fold(0.0, |acc, pair| {
        let dt_s = (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0;
        acc + pair[0].flow_m3s * dt_s
    })
}

/// Simpson's rule needs an odd sample count (an even number of equal
/// sub-intervals); an even sample count falls back to trapezoidal over the
/// whole trace rather than dropping a sample (spec §4.5.1, decided per
/// SPEC_FULL.md §D.4).
fn simpson_total(trace: &[FlowSample]) -> (f64, bool) {
    let n = trace.len();
    if n < 3 || n % 2 == 0 {
        return (trapezoidal_total(trace), true);
    }
    let h = (trace[1].timestamp - trace[0].timestamp).num_milliseconds() as f64 / 1000.0;
    let mut sum = trace[0].flow_m3s + trace[n - 1].flow_m3s;
    for (i, sample) in trace.iter().enumerate().take(n - 1).skip(1) {
        sum += sample.flow_m3s * if i % 2 == 0 { 2.0 } else { 4.0 };
    }
    (sum * h / 3.0, false)
}

pub fn integrate_volume(trace: &[FlowSample], method: IntegrationMethod, interval_minutes: i64) -> VolumeIntegrationResult {
    let trace = sorted_trace(trace);
    if trace.len() < 2 {
        return VolumeIntegrationResult {
            method_used: IntegrationMethod::Trapezoidal,
            total_volume_m3: 0.0,
            duration_s: 0.0,
            cumulative_m3: Vec::new(),
        };
    }

    let (total_volume_m3, method_used) = match method {
        IntegrationMethod::Trapezoidal => (trapezoidal_total(&trace), IntegrationMethod::Trapezoidal),
        IntegrationMethod::Rectangular => (rectangular_total(&trace), IntegrationMethod::Rectangular),
        IntegrationMethod::Simpson => {
            let (volume, fell_back) = simpson_total(&trace);
            (volume, if fell_back { IntegrationMethod::Trapezoidal } else { IntegrationMethod::Simpson })
        }
    };

    let t0 = trace[0].timestamp;
    let t_end = trace[trace.len() - 1].timestamp;
    let duration_s = (t_end - t0).num_milliseconds() as f64 / 1000.0;

    let interval = chrono::Duration::minutes(interval_minutes.max(1));
    let mut cumulative_m3 = Vec::new();
    let mut boundary = t0 + interval;
    while boundary < t_end {
        cumulative_m3.push((boundary, volume_between(&trace, t0, boundary)));
        boundary += interval;
    }
    cumulative_m3.push((t_end, volume_between(&trace, t0, t_end)));

    VolumeIntegrationResult {
        method_used,
        total_volume_m3,
        duration_s,
        cumulative_m3,
    }
}

/// Quality report for a raw flow trace before integration (spec §4.5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceValidation {
    pub quality_score: f64,
    pub sample_count: usize,
    pub duration_s: f64,
    pub mean_interval_s: f64,
    pub issues: Vec<String>,
}

fn percentile(sorted_values: &[f64], p: f64) -> f64 {
    if sorted_values.is_empty() {
        return 0.0;
    }
    let idx = (p * (sorted_values.len() - 1) as f64).round() as usize;
    sorted_values[idx.min(sorted_values.len() - 1)]
}

pub fn validate_flow_trace(trace: &[FlowSample]) -> TraceValidation {
    let sorted = sorted_trace(trace);
    let sample_count = sorted.len();
    let mut issues = Vec::new();
    let mut quality_score = 1.0_f64;

    if sample_count < 2 {
        issues.push("insufficient_samples".to_string());
        quality_score -= 0.2;
        return TraceValidation {
            quality_score: quality_score.clamp(0.0, 1.0),
            sample_count,
            duration_s: 0.0,
            mean_interval_s: 0.0,
            issues,
        };
    }

    let duration_s = (sorted[sample_count - 1].timestamp - sorted[0].timestamp).num_milliseconds() as f64 / 1000.0;
    let intervals: Vec<f64> = sorted
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect();
    let mean_interval_s = duration_s / (sample_count - 1) as f64;

    let mut sorted_intervals = intervals.clone();
    sorted_intervals.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median_interval = percentile(&sorted_intervals, 0.5);

    if intervals.iter().any(|&d| d > 3.0 * median_interval) {
        issues.push("gaps_exceed_3x_median_interval".to_string());
        quality_score -= 0.2;
    }
    if sorted.iter().any(|s| s.flow_m3s < 0.0) {
        issues.push("negative_flow_values".to_string());
        quality_score -= 0.2;
    }

    let mut flows: Vec<f64> = sorted.iter().map(|s| s.flow_m3s).collect();
    flows.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let q1 = percentile(&flows, 0.25);
    let q3 = percentile(&flows, 0.75);
    let iqr = q3 - q1;
    let (low, high) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    if flows.iter().any(|&q| q < low || q > high) {
        issues.push("iqr_outliers_present".to_string());
        quality_score *= 0.9;
    }

    TraceValidation {
        quality_score: quality_score.clamp(0.0, 1.0),
        sample_count,
        duration_s,
        mean_interval_s,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_trace() -> Vec<FlowSample> {
        let t0 = Utc::now();
        (0..5)
            .map(|i| FlowSample {
                timestamp: t0 + Duration::minutes(30 * i),
                flow_m3s: 2.0 + i as f64 * 0.1,
                quality: 1.0,
            })
            .collect()
    }

    #[test]
    fn trapezoidal_and_rectangular_bracket_a_rising_trace() {
        let trace = sample_trace();
        let trap = integrate_volume(&trace, IntegrationMethod::Trapezoidal, 60);
        let rect = integrate_volume(&trace, IntegrationMethod::Rectangular, 60);
        assert!(trap.total_volume_m3 > rect.total_volume_m3);
    }

    #[test]
    fn even_sample_count_simpson_falls_back_to_trapezoidal() {
        let mut trace = sample_trace();
        trace.pop();
        assert_eq!(trace.len() % 2, 0);
        let trap = integrate_volume(&trace, IntegrationMethod::Trapezoidal, 60);
        let simpson = integrate_volume(&trace, IntegrationMethod::Simpson, 60);
        assert_eq!(simpson.method_used, IntegrationMethod::Trapezoidal);
        assert!((simpson.total_volume_m3 - trap.total_volume_m3).abs() < 1e-9);
    }

    #[test]
    fn validation_flags_negative_samples() {
        let mut trace = sample_trace();
        trace[2].flow_m3s = -1.0;
        let report = validate_flow_trace(&trace);
        assert!(report.issues.contains(&"negative_flow_values".to_string()));
        assert!(report.quality_score < 1.0);
    }
}
