//! Scenario and property tests for the NDM-TCP controller.
//!
//! Unit tests for the individual stages live next to them; this module drives the full
//! controller (and, where useful, a host window) through acknowledgment sequences.

use std::time::Duration;

use proptest::prelude::*;
use rstest::rstest;

use crate::congestion_control::{AckSample, CaEvent, CaState, GrowthDirective};
use crate::replay::{Replay, TraceEvent};
use crate::synth::{NetworkProfile, TraceGenerator};
use crate::window::TransportWindow;
use crate::{CongestionControlConfig, CongestionController};

use super::config::{NdmConfig, Precision, SkipPolicy, INFINITE_SSTHRESH};
use super::controller::NdmController;
use super::state::Phase;

// ============================================================================
// Test harness
// ============================================================================

fn ack(acked: u32, rtt_us: u64, cwnd: u32) -> AckSample {
    AckSample {
        acked,
        rtt: Duration::from_micros(rtt_us),
        cwnd,
        window_limited: true,
    }
}

/// Alternates between two RTTs: pure jitter, no trend.
fn oscillating(i: usize, low_us: u64, high_us: u64) -> u64 {
    if i % 2 == 0 {
        low_us
    } else {
        high_us
    }
}

/// Feed `count` acks with RTTs from `rtt_us`, returning the last directive.
fn feed(
    controller: &mut NdmController,
    count: usize,
    acked: u32,
    cwnd: u32,
    rtt_us: impl Fn(usize) -> u64,
) -> GrowthDirective {
    let mut last = GrowthDirective::Hold;
    for i in 0..count {
        last = controller.on_ack(ack(acked, rtt_us(i), cwnd));
    }
    last
}

/// Controller in congestion avoidance that has seen one full refresh of jitter.
fn noisy_avoidance(precision: Precision) -> NdmController {
    let config = precision.preset();
    let refresh = config.refresh_interval as usize;
    let mut controller = NdmController::new(config, 20, 10);
    feed(&mut controller, refresh, 1, 20, |i| oscillating(i, 2_000, 4_000));
    controller
}

/// Controller in congestion avoidance that has seen one full refresh of a flat RTT.
fn flat_avoidance(precision: Precision) -> NdmController {
    let config = precision.preset();
    let refresh = config.refresh_interval as usize;
    let mut controller = NdmController::new(config, 20, 10);
    feed(&mut controller, refresh, 1, 20, |_| 2_000);
    controller
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn sub_quantum_drift_halves_slow_start() {
    let mut controller = NdmController::new(NdmConfig::standard(), 10, 0);
    assert_eq!(controller.ssthresh(), INFINITE_SSTHRESH);

    // Strictly increasing, all within one 1ms quantization step
    let rtt = |i: usize| 20_000 + i as u64 * 100;
    for i in 0..7 {
        assert_eq!(
            controller.on_ack(ack(2, rtt(i), 10)),
            GrowthDirective::SlowStart { acked: 2 }
        );
        assert!(!controller.signals().congestion_detected);
    }

    let directive = controller.on_ack(ack(2, rtt(7), 10));
    let signals = controller.signals();
    assert!(signals.has_enough_data);
    assert!(signals.congestion_detected);
    assert_eq!(controller.entropy(), 0);
    assert_eq!(directive, GrowthDirective::SlowStart { acked: 1 });

    // Same acked segments on a jittery path keep the full slow-start rate
    let mut noisy = NdmController::new(NdmConfig::standard(), 10, 0);
    let directive = feed(&mut noisy, 8, 2, 10, |i| oscillating(i, 20_000, 40_000));
    assert!(!noisy.signals().congestion_detected);
    assert_eq!(directive, GrowthDirective::SlowStart { acked: 2 });
}

#[rstest]
#[case::one_quantum_steps(1_000)]
#[case::five_quantum_steps(5_000)]
fn multi_quantum_ramp_reads_as_noise(#[case] step_us: u64) {
    let mut controller = NdmController::new(NdmConfig::standard(), 10, 0);
    let directive = feed(&mut controller, 8, 2, 10, |i| 20_000 + i as u64 * step_us);

    // Eight distinct levels fill all eight bins once
    assert_eq!(controller.entropy(), 1000);
    let signals = controller.signals();
    assert!(signals.has_enough_data);
    assert!(!signals.congestion_detected);
    assert_eq!(directive, GrowthDirective::SlowStart { acked: 2 });
}

#[rstest]
#[case::standard(Precision::Standard)]
#[case::compact(Precision::Compact)]
fn wan_jitter_reads_as_noise_in_every_profile(#[case] precision: Precision) {
    let config = precision.preset();
    let threshold = config.entropy_threshold;
    let mut controller = NdmController::new(config, 10, 0);
    let directive = feed(&mut controller, 16, 2, 10, |i| oscillating(i, 40_000, 60_000));

    assert!(controller.entropy() > threshold, "entropy {}", controller.entropy());
    assert!(!controller.signals().congestion_detected);
    assert_eq!(directive, GrowthDirective::SlowStart { acked: 2 });
}

#[test]
fn oscillating_rtt_is_noise_with_aggressive_growth() {
    let mut noisy = NdmController::new(NdmConfig::standard(), 20, 10);
    let noisy_directive = feed(&mut noisy, 16, 10, 20, |i| oscillating(i, 20_000, 40_000));
    assert_eq!(noisy.entropy(), 333);
    assert!(noisy.entropy() > noisy.config().entropy_threshold);
    assert!(!noisy.signals().congestion_detected);
    assert_eq!(noisy.phase(), Phase::CongestionAvoidance);

    let mut flat = NdmController::new(NdmConfig::standard(), 20, 10);
    let flat_directive = feed(&mut flat, 16, 10, 20, |_| 20_000);
    assert!(flat.signals().congestion_detected);

    let step = |d: GrowthDirective| match d {
        GrowthDirective::AdditiveIncrease { step } => step,
        other => panic!("expected additive increase, got {other:?}"),
    };
    let noisy_step = step(noisy_directive);
    let flat_step = step(flat_directive);
    assert!(noisy_step >= 5, "noise should grow near full rate, got {noisy_step}");
    assert!(noisy_step > flat_step);
}

#[rstest]
#[case::standard(Precision::Standard)]
#[case::compact(Precision::Compact)]
fn loss_at_high_entropy_is_gentler(#[case] precision: Precision) {
    let mut noisy = noisy_avoidance(precision);
    let mut flat = flat_avoidance(precision);
    assert!(noisy.entropy() > noisy.config().entropy_threshold);
    assert_eq!(flat.entropy(), 0);

    assert_eq!(noisy.on_loss(30), 10);
    assert_eq!(flat.on_loss(30), 15);
    assert_eq!(noisy.prior_cwnd(), 30);
    assert_eq!(flat.prior_cwnd(), 30);
}

#[rstest]
#[case::standard(Precision::Standard)]
#[case::compact(Precision::Compact)]
fn high_plasticity_forces_standard_halving(#[case] precision: Precision) {
    let mut controller = noisy_avoidance(precision);
    for _ in 0..6 {
        controller.on_state(CaState::Loss);
    }
    assert!(controller.plasticity() >= controller.config().reactive_plasticity);
    assert!(controller.entropy() > controller.config().entropy_threshold);
    assert_eq!(controller.on_loss(30), 15);
}

#[rstest]
#[case::standard(Precision::Standard)]
#[case::compact(Precision::Compact)]
fn entropy_refreshes_every_k_acks(#[case] precision: Precision) {
    let config = precision.preset();
    let k = config.refresh_interval as usize;
    let mut controller = NdmController::new(config, 20, 10);

    for i in 0..k - 1 {
        controller.on_ack(ack(1, oscillating(i, 2_000, 4_000), 20));
        assert_eq!(controller.entropy(), 0, "entropy changed after {} acks", i + 1);
        assert!(!controller.signals().has_enough_data);
    }
    controller.on_ack(ack(1, oscillating(k - 1, 2_000, 4_000), 20));
    assert!(controller.entropy() > 0);
    let refreshed = controller.entropy();

    // Next K-1 acks of a flat RTT leave the score alone
    for _ in 0..k - 1 {
        controller.on_ack(ack(1, 2_000, 20));
        assert_eq!(controller.entropy(), refreshed);
    }
    assert_eq!(controller.stats().entropy_refreshes, 1);
}

#[test]
fn zero_acked_does_not_advance_refresh() {
    let mut controller = NdmController::new(NdmConfig::standard(), 20, 10);
    feed(&mut controller, 7, 1, 20, |i| oscillating(i, 2_000, 4_000));
    for _ in 0..5 {
        controller.on_ack(ack(0, 4_000, 20));
    }
    assert_eq!(controller.entropy(), 0);
    controller.on_ack(ack(1, 4_000, 20));
    assert!(controller.entropy() > 0);
}

#[test]
fn loss_recent_cleared_by_refresh() {
    let mut controller = flat_avoidance(Precision::Standard);
    controller.on_loss(20);
    assert!(controller.signals().loss_recent);
    // Two refreshes so the flat samples leave the history
    feed(&mut controller, 16, 1, 10, |i| oscillating(i, 2_000, 4_000));
    let signals = controller.signals();
    assert!(!signals.loss_recent);
    assert!(!signals.congestion_detected);
}

#[test]
fn undo_recomputes_phase() {
    let mut controller = flat_avoidance(Precision::Standard);
    let ssthresh = controller.on_loss(40);
    assert_eq!(ssthresh, 20);

    // Host recovered to 10 segments; the next ack is in slow start
    controller.on_ack(ack(1, 2_000, 10));
    assert_eq!(controller.phase(), Phase::SlowStart);

    assert_eq!(controller.on_undo(10), 40);
    assert_eq!(controller.phase(), Phase::CongestionAvoidance);
}

#[test]
fn loss_event_only_sets_flags() {
    let mut controller = NdmController::new(NdmConfig::standard(), 10, 0);
    controller.on_event(CaEvent::Loss);
    let signals = controller.signals();
    assert!(signals.congestion_detected && signals.loss_recent);
    assert_eq!(controller.plasticity(), controller.config().plasticity.base);
    assert_eq!(controller.ssthresh(), INFINITE_SSTHRESH);
}

// ============================================================================
// Fast path
// ============================================================================

fn always_skip(max_consecutive: u8) -> NdmConfig {
    NdmConfig {
        skip: SkipPolicy {
            entropy_ceiling: u16::MAX,
            plasticity_floor: 0,
            max_consecutive,
        },
        ..NdmConfig::standard()
    }
}

#[test]
fn fast_path_never_skips_at_base_plasticity() {
    let mut controller = NdmController::new(NdmConfig::standard(), 20, 10);
    feed(&mut controller, 100, 1, 20, |_| 2_000);
    let stats = controller.stats();
    assert_eq!(stats.predictor_skips, 0);
    assert_eq!(stats.predictor_runs, 100);
}

#[test]
fn fast_path_skips_are_bounded_and_freeze_hidden_state() {
    let mut controller = NdmController::new(always_skip(3), 20, 10);

    let hidden = controller.hidden();
    let signal = controller.cached_signal();
    for expected_skips in 1..=3 {
        controller.on_ack(ack(1, 20_000 + expected_skips as u64 * 5_000, 20));
        assert_eq!(controller.consecutive_skips(), expected_skips);
        assert_eq!(controller.hidden(), hidden);
        assert_eq!(controller.cached_signal(), signal);
    }

    // Forced recomputation, then the cycle starts over
    controller.on_ack(ack(1, 35_000, 20));
    assert_eq!(controller.consecutive_skips(), 0);
    controller.on_ack(ack(1, 35_000, 20));
    assert_eq!(controller.consecutive_skips(), 1);

    let stats = controller.stats();
    assert_eq!(stats.predictor_runs, 1);
    assert_eq!(stats.predictor_skips, 4);
}

#[test]
fn zero_skip_bound_disables_fast_path() {
    let mut controller = NdmController::new(always_skip(0), 20, 10);
    feed(&mut controller, 20, 1, 20, |_| 2_000);
    assert_eq!(controller.stats().predictor_skips, 0);
}

// ============================================================================
// End-to-end through the host window
// ============================================================================

fn replay_profile(profile: NetworkProfile, acks: usize) -> Replay {
    let controller = CongestionControlConfig::default().build(10, 0).unwrap();
    let mut replay = Replay::new(controller, TransportWindow::new(10, 0));
    replay.run(TraceGenerator::new(profile, 42).generate(acks));
    replay
}

#[test]
fn sub_quantum_jitter_classified_as_congestion() {
    let replay = replay_profile(NetworkProfile::LAN, 64);
    let stats = replay.controller().ndm_stats().unwrap();
    assert_eq!(stats.entropy, 0);
    assert!(stats.signals.congestion_detected);
}

#[test]
fn wireless_jitter_classified_as_noise() {
    let profile = NetworkProfile {
        loss_rate: 0.0,
        ..NetworkProfile::WIRELESS
    };
    let replay = replay_profile(profile, 64);
    let stats = replay.controller().ndm_stats().unwrap();
    assert!(stats.entropy > 300, "entropy {}", stats.entropy);
    assert!(!stats.signals.congestion_detected);
}

#[test]
fn slow_start_exits_after_first_loss() {
    let controller = CongestionControlConfig::default().build(10, 0).unwrap();
    let mut replay = Replay::new(controller, TransportWindow::new(10, 0));
    replay.run((0..40).map(|i| TraceEvent::Ack {
        acked: 1,
        rtt_us: oscillating(i, 20_000, 40_000),
        window_limited: true,
    }));
    let grown = replay.window().cwnd();
    replay.step(TraceEvent::Loss { timeout: false });
    assert!(replay.window().cwnd() < grown);

    let record = replay.step(TraceEvent::Ack {
        acked: 1,
        rtt_us: 20_000,
        window_limited: true,
    });
    assert!(matches!(
        record.directive,
        Some(GrowthDirective::AdditiveIncrease { .. })
    ));
}

#[test_log::test]
fn loss_and_restart_are_logged_without_panicking() {
    let mut controller = noisy_avoidance(Precision::Standard);
    controller.on_loss(30);
    controller.on_undo(10);
    controller.on_event(CaEvent::RestartAfterIdle);
    assert_eq!(controller.plasticity(), controller.config().plasticity.base);
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Ack {
        acked: u32,
        rtt_us: u64,
        cwnd: u32,
        window_limited: bool,
    },
    Loss(u32),
    Undo(u32),
    Event(CaEvent),
    State(CaState),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (0u32..8, 0u64..500_000, 1u32..500, any::<bool>()).prop_map(
            |(acked, rtt_us, cwnd, window_limited)| Op::Ack { acked, rtt_us, cwnd, window_limited }
        ),
        1 => (1u32..500).prop_map(Op::Loss),
        1 => (1u32..500).prop_map(Op::Undo),
        1 => prop_oneof![Just(CaEvent::Loss), Just(CaEvent::RestartAfterIdle)].prop_map(Op::Event),
        1 => prop_oneof![
            Just(CaState::Open),
            Just(CaState::Disorder),
            Just(CaState::Cwr),
            Just(CaState::Recovery),
            Just(CaState::Loss),
        ]
        .prop_map(Op::State),
    ]
}

fn apply(controller: &mut NdmController, op: &Op) -> Option<u32> {
    match *op {
        Op::Ack {
            acked,
            rtt_us,
            cwnd,
            window_limited,
        } => {
            controller.on_ack(AckSample {
                acked,
                rtt: Duration::from_micros(rtt_us),
                cwnd,
                window_limited,
            });
            None
        }
        Op::Loss(cwnd) => Some(controller.on_loss(cwnd)),
        Op::Undo(cwnd) => Some(controller.on_undo(cwnd)),
        Op::Event(event) => {
            controller.on_event(event);
            None
        }
        Op::State(state) => {
            controller.on_state(state);
            None
        }
    }
}

fn precision_strategy() -> impl Strategy<Value = Precision> {
    prop_oneof![Just(Precision::Standard), Just(Precision::Compact)]
}

proptest! {
    #[test]
    fn plasticity_stays_within_bounds(
        precision in precision_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..300),
    ) {
        let config = precision.preset();
        let params = config.plasticity;
        let mut controller = NdmController::new(config, 10, 0);
        for op in &ops {
            apply(&mut controller, op);
            let p = controller.plasticity();
            prop_assert!(p >= params.floor && p <= params.ceiling, "plasticity {} after {:?}", p, op);
        }
    }

    #[test]
    fn undo_never_below_prior_cwnd(
        precision in precision_strategy(),
        warmup in prop::collection::vec(op_strategy(), 0..100),
        loss_cwnd in 1u32..10_000,
        undo_cwnd in 1u32..10_000,
    ) {
        let mut controller = NdmController::new(precision.preset(), 10, 0);
        for op in &warmup {
            apply(&mut controller, op);
        }
        controller.on_loss(loss_cwnd);
        let restored = controller.on_undo(undo_cwnd);
        prop_assert!(restored >= loss_cwnd);
        prop_assert!(restored >= undo_cwnd);
    }

    #[test]
    fn skips_never_exceed_bound(
        max_consecutive in 0u8..10,
        rtts in prop::collection::vec(1_000u64..100_000, 1..200),
    ) {
        let mut controller = NdmController::new(always_skip(max_consecutive), 20, 10);
        let mut run = 0u32;
        for rtt_us in rtts {
            let before = controller.stats().predictor_skips;
            controller.on_ack(ack(1, rtt_us, 20));
            if controller.stats().predictor_skips > before {
                run += 1;
            } else {
                run = 0;
            }
            prop_assert!(run <= max_consecutive as u32);
            prop_assert!(controller.consecutive_skips() <= max_consecutive);
        }
    }

    #[test]
    fn identical_inputs_identical_outputs(
        precision in precision_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let mut a = NdmController::new(precision.preset(), 10, 0);
        let mut b = NdmController::new(precision.preset(), 10, 0);
        for op in &ops {
            prop_assert_eq!(apply(&mut a, op), apply(&mut b, op));
        }
        prop_assert_eq!(a.stats(), b.stats());
    }

    #[test]
    fn signal_and_hidden_stay_bounded(
        precision in precision_strategy(),
        ops in prop::collection::vec(op_strategy(), 1..200),
    ) {
        let config = precision.preset();
        let unit = config.signal_unit;
        let mut controller = NdmController::new(config, 10, 0);
        for op in &ops {
            apply(&mut controller, op);
            prop_assert!(controller.cached_signal() <= unit);
            prop_assert!(controller.hidden().iter().all(|h| h.unsigned_abs() <= unit));
            prop_assert!(controller.entropy() <= controller.config().entropy_scale);
        }
    }

    #[test]
    fn ssthresh_respects_floor(
        precision in precision_strategy(),
        cwnd in 0u32..100,
    ) {
        let mut controller = NdmController::new(precision.preset(), 10, 0);
        prop_assert!(controller.on_loss(cwnd) >= controller.config().min_ssthresh);
    }
}

#[test]
fn dispatch_matches_direct_controller() {
    let mut direct = NdmController::new(NdmConfig::standard(), 10, 0);
    let controller = CongestionControlConfig::default().build(10, 0).unwrap();
    let CongestionController::Ndm(mut boxed) = controller else {
        panic!("default algorithm should be NDM");
    };
    for i in 0..50 {
        let sample = ack(1, oscillating(i, 20_000, 30_000), 10 + i as u32);
        assert_eq!(direct.on_ack(sample), boxed.on_ack(sample));
    }
    assert_eq!(direct.stats(), boxed.stats());
}
