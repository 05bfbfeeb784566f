//! Two-process energy curve
//!
//! Energy is a blend of homeostatic sleep pressure (Process S) and a
//! circadian drive (Process C) anchored on the chronotype landmarks, then
//! reduced by current sleep debt. Debt also deepens the afternoon dip and
//! pulls it earlier.

use crate::clock;
use crate::config::{EnergyConfig, ModelConfig};
use crate::types::{
    ChronotypeResult, CurveLandmark, EnergyCurvePoint, EnergyCurveSummary, EnergyZone, TimeWindow,
};
use chrono::NaiveDateTime;
use std::f64::consts::PI;
use tracing::debug;

/// Landmarks the curve is anchored on
#[derive(Debug, Clone, Copy)]
struct Anchors {
    wake: f64,
    onset: f64,
    acrophase: f64,
    melatonin: TimeWindow,
}

impl Anchors {
    fn from_chronotype(chronotype: &ChronotypeResult) -> Option<Self> {
        Some(Self {
            wake: chronotype.average_wake_time?,
            onset: chronotype.habitual_sleep_onset?,
            acrophase: chronotype.circadian_acrophase?,
            melatonin: chronotype.melatonin_window?,
        })
    }

    fn awake_span(&self) -> f64 {
        clock::wrap_hour(self.onset - self.wake)
    }

    fn is_awake(&self, hour: f64) -> bool {
        clock::in_window(hour, self.wake, self.onset)
    }
}

/// Process S at its periodic steady state over one habitual day
#[derive(Debug, Clone, Copy)]
struct Homeostat {
    upper: f64,
    rise_tau: f64,
    decay_tau: f64,
    at_wake: f64,
    at_onset: f64,
    /// Level sleep decays toward; above zero when recovery is incomplete
    floor: f64,
}

impl Homeostat {
    /// Solve for the pressure at wake that repeats every 24 h, with
    /// `residual` pressure left over from incomplete recovery
    fn steady_state(config: &EnergyConfig, awake_hours: f64, residual: f64) -> Self {
        let upper = config.s_upper_asymptote;
        let rise = (-awake_hours / config.s_rise_tau_hours).exp();
        let decay = (-(clock::HOURS_PER_DAY - awake_hours) / config.s_decay_tau_hours).exp();

        let at_wake = (upper * (1.0 - rise) * decay + residual) / (1.0 - rise * decay);
        let at_onset = upper - (upper - at_wake) * rise;
        // Sleep ends at `at_onset * decay + residual`, the same level waking starts from
        let floor = residual / (1.0 - decay);

        Self {
            upper,
            rise_tau: config.s_rise_tau_hours,
            decay_tau: config.s_decay_tau_hours,
            at_wake,
            at_onset,
            floor,
        }
    }

    fn at(&self, anchors: &Anchors, hour: f64) -> f64 {
        let s = if anchors.is_awake(hour) {
            let t = clock::wrap_hour(hour - anchors.wake);
            self.upper - (self.upper - self.at_wake) * (-t / self.rise_tau).exp()
        } else {
            let t = clock::wrap_hour(hour - anchors.onset);
            self.floor + (self.at_onset - self.floor) * (-t / self.decay_tau).exp()
        };
        s.clamp(0.0, 1.0)
    }
}

/// Debt-dependent shape of the curve
#[derive(Debug, Clone, Copy)]
struct DebtEffect {
    penalty: f64,
    dip_amplitude: f64,
    dip_center: f64,
    residual: f64,
}

impl DebtEffect {
    fn new(config: &EnergyConfig, anchors: &Anchors, debt: f64) -> Self {
        let shift = (debt * config.dip_shift_per_debt_hour).min(config.max_dip_shift_hours);
        Self {
            penalty: (debt * config.debt_penalty_per_hour).min(config.max_debt_penalty),
            dip_amplitude: (config.dip_amplitude + debt * config.dip_amplitude_per_debt_hour)
                .min(config.max_dip_amplitude),
            dip_center: clock::wrap_hour(
                anchors.acrophase - config.dip_before_acrophase_hours - shift,
            ),
            residual: (debt * config.residual_pressure_per_debt_hour)
                .min(config.max_residual_pressure),
        }
    }
}

/// Circadian drive in [0, 1]: a 24 h cosine peaking at the acrophase plus a
/// 12 h harmonic whose daytime trough is the afternoon dip
fn circadian(hour: f64, acrophase: f64, effect: &DebtEffect) -> f64 {
    let a2 = effect.dip_amplitude;
    let harmonic_phase = effect.dip_center - 6.0;
    let c = (2.0 * PI * (hour - acrophase) / clock::HOURS_PER_DAY).cos()
        + a2 * (4.0 * PI * (hour - harmonic_phase) / clock::HOURS_PER_DAY).cos();
    ((c + 1.0 + a2) / (2.0 + 2.0 * a2)).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Extremum {
    Peak,
    Dip,
}

/// Projects the hourly energy curve for one day
#[derive(Debug, Clone, Default)]
pub struct EnergyCurveSimulator {
    config: EnergyConfig,
}

impl EnergyCurveSimulator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            config: config.energy.clone(),
        }
    }

    /// Simulate the curve for the day containing `now`
    pub fn simulate(
        &self,
        chronotype: &ChronotypeResult,
        current_debt: f64,
        now: NaiveDateTime,
    ) -> EnergyCurveSummary {
        self.simulate_at_hour(chronotype, current_debt, clock::hour_of(now))
    }

    /// Simulate with "now" given as a fractional clock hour
    pub fn simulate_at_hour(
        &self,
        chronotype: &ChronotypeResult,
        current_debt: f64,
        now_hour: f64,
    ) -> EnergyCurveSummary {
        if !chronotype.success {
            return EnergyCurveSummary::insufficient(
                chronotype
                    .message
                    .clone()
                    .unwrap_or_else(|| "Chronotype unavailable".to_string()),
            );
        }
        let Some(anchors) = Anchors::from_chronotype(chronotype) else {
            return EnergyCurveSummary::insufficient("Chronotype is missing circadian landmarks");
        };
        let awake_hours = anchors.awake_span();
        if !(1.0..=23.0).contains(&awake_hours) {
            return EnergyCurveSummary::insufficient(format!(
                "Habitual wake window of {:.1} h is not plausible",
                awake_hours
            ));
        }

        let debt = if current_debt.is_finite() {
            current_debt.max(0.0)
        } else {
            0.0
        };
        let now_hour = if now_hour.is_finite() {
            clock::wrap_hour(now_hour)
        } else {
            0.0
        };

        let effect = DebtEffect::new(&self.config, &anchors, debt);
        let points = self.points(&anchors, &effect);

        let current_index = now_hour.floor() as usize % points.len();
        let next_index = (current_index + 1) % points.len();
        let fraction = now_hour - now_hour.floor();
        let current_energy = points[current_index].energy
            + (points[next_index].energy - points[current_index].energy) * fraction;

        let next_peak = next_extremum(&points, &anchors, current_index, Extremum::Peak);
        let next_dip = next_extremum(&points, &anchors, current_index, Extremum::Dip);

        debug!(
            debt,
            penalty = effect.penalty,
            current_energy,
            next_peak = next_peak.as_ref().map(|p| p.hour),
            next_dip = next_dip.as_ref().map(|d| d.hour),
            "Simulated energy curve"
        );

        EnergyCurveSummary {
            success: true,
            message: None,
            current_zone: Some(points[current_index].zone),
            points,
            current_energy: Some(current_energy),
            next_peak,
            next_dip,
            melatonin_window: Some(anchors.melatonin),
            debt_penalty: effect.penalty,
        }
    }

    fn points(&self, anchors: &Anchors, effect: &DebtEffect) -> Vec<EnergyCurvePoint> {
        let homeostat = Homeostat::steady_state(&self.config, anchors.awake_span(), effect.residual);
        let weight = self.config.circadian_weight;

        let raw: Vec<(f64, f64, f64)> = (0..24)
            .map(|h| {
                let hour = h as f64;
                let s = homeostat.at(anchors, hour);
                let c = circadian(hour, anchors.acrophase, effect);
                let energy = (weight * c + (1.0 - weight) * (1.0 - s)) * (1.0 - effect.penalty);
                ((energy * 100.0).clamp(0.0, 100.0), s, c)
            })
            .collect();

        let awake_max = raw
            .iter()
            .enumerate()
            .filter(|(h, _)| anchors.is_awake(*h as f64))
            .map(|(_, (e, _, _))| *e)
            .fold(0.0, f64::max);
        let peak_level = awake_max * self.config.peak_fraction;

        raw.iter()
            .enumerate()
            .map(|(h, &(energy, process_s, process_c))| {
                let hour = h as f64;
                let zone = if !anchors.is_awake(hour) {
                    EnergyZone::Sleep
                } else if anchors.melatonin.contains(hour) {
                    EnergyZone::WindDown
                } else if energy >= peak_level {
                    EnergyZone::Peak
                } else if raw[(h + 1) % 24].0 > raw[(h + 23) % 24].0 {
                    EnergyZone::Rising
                } else {
                    EnergyZone::Dip
                };

                EnergyCurvePoint {
                    hour: h as u8,
                    energy,
                    zone,
                    process_s,
                    process_c,
                }
            })
            .collect()
    }
}

/// First awake local maximum or minimum strictly after `from`, wrapping past
/// midnight
fn next_extremum(
    points: &[EnergyCurvePoint],
    anchors: &Anchors,
    from: usize,
    kind: Extremum,
) -> Option<CurveLandmark> {
    let n = points.len();
    (1..n).find_map(|ahead| {
        let i = (from + ahead) % n;
        if !anchors.is_awake(i as f64) {
            return None;
        }
        let here = points[i].energy;
        let prev = points[(i + n - 1) % n].energy;
        let next = points[(i + 1) % n].energy;
        let hit = match kind {
            Extremum::Peak => here > prev && here >= next,
            Extremum::Dip => here < prev && here <= next,
        };
        hit.then(|| CurveLandmark {
            hour: i as u8,
            energy: here,
            hours_ahead: ahead as u8,
        })
    })
}
