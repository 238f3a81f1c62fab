use proptest::prelude::*;

use super::{CounterSession, EventSlotMapping, Measurement, ScopedSession, State, ELAPSED_LABEL};
use crate::backend::replay::{Call, Op, ReplayBackend};
use crate::backend::MAX_SLOTS;
use crate::config::Opts;
use crate::error::Error;
use crate::event::{Event, EventCatalog};

const INSTR: Event = Event::InstructionsRetired;
const CYCLES: Event = Event::Cycles;

fn backend(slots: usize, samples: &[&[u64]]) -> ReplayBackend {
    let backend = ReplayBackend::new(slots);
    for sample in samples {
        backend.push_sample(sample.iter().copied());
    }
    backend
}

fn cells(line: &str, width: usize) -> Vec<String> {
    line.as_bytes()
        .chunks(width)
        .map(|it| String::from_utf8_lossy(it).trim().to_string())
        .collect()
}

#[test]
fn test_start_stop_deltas() {
    let backend = backend(2, &[&[100, 40], &[600, 140]]);
    let mut session = CounterSession::new(backend, [INSTR, CYCLES]).unwrap();

    session.start().unwrap();
    let measurement = session.stop().unwrap();

    assert_eq!(measurement.get(INSTR), Some(500));
    assert_eq!(measurement.get(CYCLES), Some(100));
    assert_eq!(measurement.events().collect::<Vec<_>>(), [INSTR, CYCLES]);

    let averaged = measurement.averaged(100).unwrap();
    assert_eq!(averaged.get(INSTR), Some(5.0));
    assert_eq!(averaged.get(CYCLES), Some(1.0));
    assert_eq!(
        averaged.elapsed_ns(),
        measurement.elapsed_ns() as f64 / 100.0
    );
}

#[test]
fn test_configures_encoded_events() {
    let backend = backend(4, &[]);
    let probe = backend.clone();
    let session = CounterSession::new(backend, [CYCLES, INSTR]).unwrap();

    assert_eq!(probe.configs(), [CYCLES.config(), INSTR.config()]);
    assert_eq!(session.state(), State::Configured);
    assert!(session.dropped().is_empty());
}

#[test]
fn test_truncates_surplus_events() {
    let requested = &Event::ALL[..5];
    let backend = backend(2, &[]);
    let probe = backend.clone();
    let session = CounterSession::new(backend, requested.iter().copied()).unwrap();

    let mapping = session.mapping();
    assert_eq!(mapping.len(), 2);
    assert_eq!(mapping.iter().collect::<Vec<_>>(), [(requested[0], 0), (requested[1], 1)]);
    assert_eq!(session.dropped(), &requested[2..]);
    assert_eq!(probe.configs().len(), 2);
}

#[test]
fn test_default_events() {
    let slots = Event::defaults().len();
    let session = CounterSession::with_default_events(backend(slots, &[])).unwrap();
    assert!(session.mapping().events().eq(Event::defaults().iter().copied()));
}

#[test]
fn test_stop_before_start() {
    let backend = backend(2, &[]);
    let probe = backend.clone();
    let mut session = CounterSession::new(backend, [INSTR]).unwrap();

    let err = session.stop().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidSessionState {
            op: "stop",
            state: State::Configured
        }
    ));
    assert!(!probe.calls().contains(&Call::ReadThreadCounters(1)));

    session.start().unwrap();
    session.stop().unwrap();
    let err = session.stop().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidSessionState {
            state: State::Stopped,
            ..
        }
    ));
}

#[test]
fn test_start_twice() {
    let mut session = CounterSession::new(backend(1, &[]), [INSTR]).unwrap();
    session.start().unwrap();
    let err = session.start().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidSessionState {
            op: "start",
            state: State::Running
        }
    ));
    assert_eq!(session.state(), State::Running);
}

#[test]
fn test_idle_window() {
    let backend = backend(2, &[&[7, 7]]);
    let mut session = CounterSession::new(backend, [INSTR, CYCLES]).unwrap();

    let ((), measurement) = session.measure(|| ()).unwrap();
    assert_eq!(measurement.get(INSTR), Some(0));
    assert_eq!(measurement.get(CYCLES), Some(0));
}

#[test]
fn test_restart() {
    let backend = backend(1, &[&[0], &[10], &[10], &[40]]);
    let probe = backend.clone();
    let mut session = CounterSession::new(backend, [INSTR]).unwrap();

    session.start().unwrap();
    let first = session.stop().unwrap();
    assert_eq!(session.state(), State::Stopped);
    session.start().unwrap();
    let second = session.stop().unwrap();

    assert_eq!(first.get(INSTR), Some(10));
    assert_eq!(second.get(INSTR), Some(30));

    let enables = probe
        .calls()
        .into_iter()
        .filter(|it| *it == Call::EnableCounting)
        .count();
    assert_eq!(enables, 1);
}

#[test]
fn test_call_order() {
    let backend = backend(1, &[]);
    let probe = backend.clone();
    let mut session = CounterSession::new(backend, [INSTR]).unwrap();
    session.start().unwrap();
    session.stop().unwrap();
    drop(session);

    assert_eq!(
        probe.calls(),
        [
            Call::AvailableSlotCount,
            Call::Configure(vec![INSTR.config()]),
            Call::EnableCounting,
            Call::ReadThreadCounters(1),
            Call::ReadThreadCounters(1),
            Call::DisableCounting,
        ]
    );
    assert!(!probe.is_counting());
}

fn init_failure(op: Op) -> Error {
    let backend = ReplayBackend::new(2);
    backend.fail(op);
    match CounterSession::new(backend, [INSTR]) {
        Err(Error::SessionInitialization(source)) => *source,
        Err(e) => panic!("unexpected error: {e:?}"),
        Ok(_) => panic!("session built despite failing {op:?}"),
    }
}

#[test]
fn test_init_failures() {
    assert!(matches!(
        init_failure(Op::AvailableSlotCount),
        Error::BackendUnavailable(_)
    ));
    assert!(matches!(
        init_failure(Op::Configure),
        Error::ConfigurationRejected(_)
    ));
}

#[test]
fn test_enable_failure() {
    let backend = backend(1, &[]);
    backend.fail(Op::EnableCounting);
    let mut session = CounterSession::new(backend.clone(), [INSTR]).unwrap();

    assert!(matches!(session.start(), Err(Error::CountingNotEnabled(_))));
    assert_eq!(session.state(), State::Configured);

    backend.recover(Op::EnableCounting);
    session.start().unwrap();
}

#[test]
fn test_read_failure_discards_window() {
    let backend = backend(1, &[&[0], &[5], &[100]]);
    let mut session = CounterSession::new(backend.clone(), [INSTR]).unwrap();

    session.start().unwrap();
    backend.fail(Op::ReadThreadCounters);
    assert!(matches!(session.stop(), Err(Error::ReadFailed(_))));
    assert_eq!(session.state(), State::Stopped);

    backend.recover(Op::ReadThreadCounters);
    session.start().unwrap();
    let measurement = session.stop().unwrap();
    assert_eq!(measurement.get(INSTR), Some(95));
}

#[test]
fn test_drop_disables_counting() {
    let backend = backend(1, &[]);
    let probe = backend.clone();
    let session = CounterSession::new(backend, [INSTR]).unwrap();
    drop(session);
    assert_eq!(probe.calls().last(), Some(&Call::DisableCounting));

    // Teardown failures are swallowed.
    let backend = ReplayBackend::new(1);
    backend.fail(Op::DisableCounting);
    let mut session = CounterSession::new(backend, [INSTR]).unwrap();
    session.start().unwrap();
    drop(session);
}

#[test]
fn test_wraparound() {
    let backend = backend(1, &[&[u64::MAX - 9], &[10]]);
    let mut session = CounterSession::new(backend, [INSTR]).unwrap();
    session.start().unwrap();
    assert_eq!(session.stop().unwrap().get(INSTR), Some(20));
}

#[test]
fn test_averaged() {
    let measurement = Measurement::new([(INSTR, 7), (CYCLES, 3)], 11);

    let once = measurement.averaged(1).unwrap();
    assert_eq!(once.get(INSTR), Some(7.0));
    assert_eq!(once.get(CYCLES), Some(3.0));
    assert_eq!(once.elapsed_ns(), 11.0);

    assert!(matches!(measurement.averaged(0), Err(Error::InvalidDivisor(0))));

    let halves = measurement.averaged(2).unwrap();
    assert_eq!(halves.get(INSTR), Some(3.5));
    assert_eq!(measurement.get(INSTR), Some(7));
    assert_eq!(halves.averaged(2).unwrap().get(INSTR), Some(1.75));
}

#[test]
fn test_render() {
    let events = [INSTR, CYCLES, Event::BranchMissesRetired];
    let measurement = Measurement::new(events.iter().map(|it| (*it, 42)), 1_000);

    let width = 20;
    let mut out = vec![];
    measurement.render(&mut out, width).unwrap();
    let out = String::from_utf8(out).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 2);

    let header = cells(lines[0], width);
    assert_eq!(header.len(), 1 + events.len());
    assert_eq!(header[0], ELAPSED_LABEL);
    for (label, event) in header[1..].iter().zip(events) {
        assert_eq!(label, EventCatalog::label_for(event.code()));
    }

    let row = cells(lines[1], width);
    assert_eq!(row, ["1000", "42", "42", "42"]);

    let averaged = measurement.averaged(4).unwrap();
    let row = cells(averaged.report(width).to_string().lines().nth(1).unwrap(), width);
    assert_eq!(row, ["250.000000", "10.500000", "10.500000", "10.500000"]);
}

#[test]
fn test_display_uses_default_width() {
    let measurement = Measurement::new([(CYCLES, 1)], 2);
    let out = measurement.to_string();
    assert_eq!(out.lines().next().unwrap().len(), 2 * 15);
}

#[test]
fn test_scoped_reports_on_drop() {
    let backend = backend(2, &[&[0, 0], &[3_000, 1_000]]);
    let probe = backend.clone();
    let opts = Opts {
        events: vec![INSTR, CYCLES],
        column_width: 16,
        qos: None,
    };

    let mut out = vec![];
    {
        let block = ScopedSession::with_opts(backend, 1_000, &opts, &mut out).unwrap();
        assert_eq!(block.session().state(), State::Running);
    }

    let out = String::from_utf8(out).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(cells(lines[0], 16)[1..], ["Instructions", "Cycles"]);
    assert_eq!(cells(lines[1], 16)[1..], ["3.000000", "1.000000"]);
    assert_eq!(probe.calls().last(), Some(&Call::DisableCounting));
}

#[test]
fn test_scoped_reports_on_unwind() {
    let backend = backend(1, &[&[0], &[50]]);
    let opts = Opts {
        events: vec![INSTR],
        ..Default::default()
    };

    let mut out = vec![];
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _block = ScopedSession::with_opts(backend, 10, &opts, &mut out).unwrap();
        panic!("benchmark body failed");
    }));
    assert!(result.is_err());

    let out = String::from_utf8(out).unwrap();
    assert!(out.lines().nth(1).unwrap().ends_with("5.000000"));
}

#[test]
fn test_scoped_finish() {
    let backend = backend(1, &[&[0], &[50]]);
    let opts = Opts {
        events: vec![INSTR],
        ..Default::default()
    };

    let mut out = vec![];
    let block = ScopedSession::with_opts(backend, 10, &opts, &mut out).unwrap();
    let measurement = block.finish().unwrap();
    assert_eq!(measurement.get(INSTR), Some(5.0));
    // Reported exactly once.
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 2);
}

#[test]
fn test_scoped_failures() {
    let opts = Opts::default();
    let err = ScopedSession::with_opts(ReplayBackend::new(4), 0, &opts, Vec::<u8>::new()).err();
    assert!(matches!(err, Some(Error::InvalidDivisor(0))));

    let backend = ReplayBackend::new(4);
    backend.fail(Op::ReadThreadCounters);
    let err = ScopedSession::with_opts(backend, 1, &opts, Vec::<u8>::new()).err();
    assert!(matches!(err, Some(Error::SessionInitialization(_))));

    let backend = ReplayBackend::new(1);
    let block = ScopedSession::with_opts(backend.clone(), 1, &opts, Vec::<u8>::new()).unwrap();
    backend.fail(Op::ReadThreadCounters);
    assert!(matches!(block.finish(), Err(Error::ReadFailed(_))));
}

#[test]
fn test_scoped_drop_panics_on_failed_stop() {
    let backend = ReplayBackend::new(1);
    let opts = Opts {
        events: vec![INSTR],
        ..Default::default()
    };

    let mut out = vec![];
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _block = ScopedSession::with_opts(backend.clone(), 10, &opts, &mut out).unwrap();
        backend.fail(Op::ReadThreadCounters);
    }));

    let msg = result.unwrap_err();
    let msg = msg
        .downcast_ref::<String>()
        .map(String::as_str)
        .unwrap_or_default();
    assert!(msg.contains("failed to read thread counters"), "{msg}");
    assert!(out.is_empty());
    assert_eq!(backend.calls().last(), Some(&Call::DisableCounting));
}

#[test]
fn test_scoped_drop_while_unwinding() {
    let backend = ReplayBackend::new(1);
    let opts = Opts {
        events: vec![INSTR],
        ..Default::default()
    };

    // A second panic would abort the test binary.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _block = ScopedSession::with_opts(backend.clone(), 10, &opts, Vec::<u8>::new()).unwrap();
        backend.fail(Op::ReadThreadCounters);
        panic!("benchmark body failed");
    }));

    let msg = result.unwrap_err();
    assert_eq!(msg.downcast_ref::<&str>(), Some(&"benchmark body failed"));
}

#[test]
fn test_mapping_capped_at_max_slots() {
    let backend = ReplayBackend::new(MAX_SLOTS + 8);
    let probe = backend.clone();
    let events = vec![INSTR; MAX_SLOTS + 10];
    let mut session = CounterSession::new(backend, events).unwrap();

    assert_eq!(session.mapping().len(), MAX_SLOTS);
    assert_eq!(session.dropped().len(), 10);
    assert_eq!(probe.configs().len(), MAX_SLOTS);

    let (_, measurement) = session.measure(|| ()).unwrap();
    assert_eq!(measurement.len(), MAX_SLOTS);
}

proptest! {
    #[test]
    fn test_mapping_keeps_request_order(
        events in prop::collection::vec(prop::sample::select(Event::ALL), 0..12),
        slots in 0usize..8,
    ) {
        let (mapping, surplus) = EventSlotMapping::new(&events, slots);
        let len = events.len().min(slots);

        prop_assert_eq!(mapping.len(), len);
        prop_assert_eq!(surplus, &events[len..]);
        for (i, (event, slot)) in mapping.iter().enumerate() {
            prop_assert_eq!(event, events[i]);
            prop_assert_eq!(slot, i);
        }
    }

    #[test]
    fn test_session_never_exceeds_slots(
        events in prop::collection::vec(prop::sample::select(Event::ALL), 0..12),
        slots in 0usize..8,
    ) {
        let backend = ReplayBackend::new(slots);
        let probe = backend.clone();
        let mut session = CounterSession::new(backend, events.clone()).unwrap();

        prop_assert_eq!(session.mapping().len(), events.len().min(slots));
        prop_assert_eq!(session.dropped().len(), events.len().saturating_sub(slots));
        prop_assert!(probe.configs().len() <= slots);

        let measurement = session.measure(|| ()).unwrap().1;
        prop_assert!(measurement.iter().all(|(_, delta)| delta == 0));
    }

    #[test]
    fn test_averaging_halves(per_iter in 0u64..10_000, n in 1u64..10_000) {
        let half = per_iter * n;

        let mut whole = CounterSession::new(backend(1, &[&[0], &[2 * half]]), [INSTR]).unwrap();
        whole.start().unwrap();
        let whole = whole.stop().unwrap().averaged(2 * n).unwrap();

        let backend = backend(1, &[&[0], &[half], &[half], &[2 * half]]);
        let mut halves = CounterSession::new(backend, [INSTR]).unwrap();
        let (_, first) = halves.measure(|| ()).unwrap();
        let (_, second) = halves.measure(|| ()).unwrap();

        let whole = whole.get(INSTR).unwrap();
        let first = first.averaged(2 * n).unwrap().get(INSTR).unwrap();
        let second = second.averaged(2 * n).unwrap().get(INSTR).unwrap();
        prop_assert!((first + second - whole).abs() <= 1e-9 * whole.max(1.0));
        prop_assert!((whole - per_iter as f64).abs() <= 1e-9 * whole.max(1.0));
    }

    #[test]
    fn test_reaveraging(delta in 0u64..u32::MAX as u64, a in 1u64..1_000, b in 1u64..1_000) {
        let measurement = Measurement::new([(INSTR, delta)], delta);
        let twice = measurement.averaged(a).unwrap().averaged(b).unwrap();
        let once = measurement.averaged(a * b).unwrap();

        let (twice, once) = (twice.get(INSTR).unwrap(), once.get(INSTR).unwrap());
        prop_assert!((twice - once).abs() <= 1e-9 * once.max(1.0));
    }
}
