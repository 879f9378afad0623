//! Verifies the real-time contract of all effects: `process` must never allocate, and
//! looper/freeze transport controls work from other threads.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

use stompcore::{
    effects::{FreezeEffect, GateEffect, LooperEffect, PitchShiftEffect, SagEffect},
    Effect, EffectTime,
};

#[cfg(debug_assertions)]
#[global_allocator]
static ALLOCATOR: AllocDisabler = AllocDisabler;

const SAMPLE_RATE: u32 = 48000;
const BLOCK: usize = 512;

// -------------------------------------------------------------------------------------------------

fn run_blocks(effect: &mut dyn Effect, amplitude: f32, blocks: usize) {
    let mut time = EffectTime::default();
    let mut buffer = vec![amplitude; BLOCK * 2];
    for _ in 0..blocks {
        buffer.fill(amplitude);
        assert_no_alloc(|| effect.process(&mut buffer, &time));
        time = time.with_added_frames(BLOCK as u64);
    }
}

#[test]
fn gate_process_does_not_allocate() {
    let mut gate = GateEffect::new();
    gate.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();
    run_blocks(&mut gate, 0.5, 50);
    run_blocks(&mut gate, 0.0, 50);
}

#[test]
fn sag_process_does_not_allocate() {
    let mut sag = SagEffect::new();
    sag.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();
    run_blocks(&mut sag, 0.8, 100);
}

#[test]
fn pitch_shift_process_does_not_allocate() {
    let mut shifter = PitchShiftEffect::new();
    shifter.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();
    run_blocks(&mut shifter, 0.5, 100);
}

#[test]
fn looper_process_does_not_allocate_across_transitions() {
    let mut looper = LooperEffect::new();
    let controller = looper.controller();
    looper.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();

    // record, stop (materializes the loop inside process), overdub and play back,
    // all without allocations on the audio thread
    controller.start_recording().unwrap();
    run_blocks(&mut looper, 0.5, 20);
    controller.stop_recording().unwrap();
    run_blocks(&mut looper, 0.0, 20);
    controller.start_overdub().unwrap();
    run_blocks(&mut looper, 0.3, 20);
    controller.stop_overdub().unwrap();
    controller.set_reverse(true).unwrap();
    run_blocks(&mut looper, 0.0, 20);

    assert!(controller.state().has_loop());
    assert!(controller.state().is_playing());
}

#[test]
fn freeze_process_does_not_allocate_across_transitions() {
    let mut freeze = FreezeEffect::new();
    let controller = freeze.controller();
    freeze.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();

    run_blocks(&mut freeze, 0.5, 50);
    controller.freeze().unwrap();
    run_blocks(&mut freeze, 0.0, 50);
    assert!(controller.is_frozen());
    controller.unfreeze().unwrap();
    run_blocks(&mut freeze, 0.0, 50);
    assert!(!controller.is_frozen());
}

#[test]
fn looper_controller_works_across_threads() {
    let mut looper = LooperEffect::new();
    let controller = looper.controller();
    looper.initialize(SAMPLE_RATE, 2, BLOCK).unwrap();

    let remote = controller.clone();
    let handle = std::thread::spawn(move || {
        remote.start_recording().unwrap();
    });
    handle.join().unwrap();

    run_blocks(&mut looper, 0.5, 10);
    assert!(controller.state().is_recording());

    let remote = controller.clone();
    let handle = std::thread::spawn(move || {
        remote.stop_recording().unwrap();
    });
    handle.join().unwrap();

    run_blocks(&mut looper, 0.0, 10);
    assert!(controller.state().is_playing());
    assert!(controller.state().has_loop());
}
