//! Integration Tests for the Reactive Engine
//!
//! These tests exercise signals, memos, effects, roots, batching, and the
//! error channel together, through the public API only.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use thiserror::Error;
use trellis_core::reactive::{
    batch, create_effect, create_fallible_effect, create_memo, create_render_effect, create_root,
    create_signal, on_cleanup, on_error, Memo,
};

#[derive(Debug, Error)]
#[error("boom at {0}")]
struct Boom(i32);

fn counter() -> (Arc<AtomicI32>, Arc<AtomicI32>) {
    let c = Arc::new(AtomicI32::new(0));
    (c.clone(), c)
}

/// A diamond (one source feeding two memos feeding one effect) settles in
/// a single pass: each node runs exactly once per write and the effect
/// only ever observes a consistent pair.
#[test]
fn diamond_runs_each_node_once_per_write() {
    let (source, set_source) = create_signal(1);
    let (a_runs, a_counter) = counter();
    let (b_runs, b_counter) = counter();
    let (e_runs, e_counter) = counter();
    let last = Arc::new(AtomicI32::new(-1));

    let a = create_memo(move |_| {
        a_counter.fetch_add(1, Ordering::SeqCst);
        source.get() + 1
    });
    let b = create_memo(move |_| {
        b_counter.fetch_add(1, Ordering::SeqCst);
        source.get() * 10
    });
    let sum = last.clone();
    create_effect(move |_: Option<&()>| {
        e_counter.fetch_add(1, Ordering::SeqCst);
        sum.store(a.get() + b.get(), Ordering::SeqCst);
    });

    assert_eq!(last.load(Ordering::SeqCst), 12);
    assert_eq!(
        (
            a_runs.load(Ordering::SeqCst),
            b_runs.load(Ordering::SeqCst),
            e_runs.load(Ordering::SeqCst)
        ),
        (1, 1, 1)
    );

    set_source.set(2);

    // a=3, b=20; one more run for every node, never two
    assert_eq!(last.load(Ordering::SeqCst), 23);
    assert_eq!(
        (
            a_runs.load(Ordering::SeqCst),
            b_runs.load(Ordering::SeqCst),
            e_runs.load(Ordering::SeqCst)
        ),
        (2, 2, 2)
    );
}

/// Three writes inside one batch produce one notification carrying the
/// last value.
#[test]
fn a_batch_coalesces_writes_into_one_notification() {
    let (count, set_count) = create_signal(0);
    let (runs, run_counter) = counter();
    let last = Arc::new(AtomicI32::new(-1));

    let seen = last.clone();
    create_effect(move |_: Option<&()>| {
        run_counter.fetch_add(1, Ordering::SeqCst);
        seen.store(count.get(), Ordering::SeqCst);
    });

    batch(|| {
        set_count.set(1);
        set_count.set(2);
        set_count.set(3);
    });

    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(last.load(Ordering::SeqCst), 3);
}

/// Writing the value a signal already holds schedules nothing.
#[test]
fn writing_the_current_value_is_silent() {
    let (count, set_count) = create_signal(5);
    let (runs, run_counter) = counter();

    create_effect(move |_: Option<&()>| {
        count.get();
        run_counter.fetch_add(1, Ordering::SeqCst);
    });

    set_count.set(5);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    set_count.set(6);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Disposal tears the tree down depth-first: a nested computation's
/// cleanups run before its owner's, and an owner's cleanups run in
/// registration order.
#[test]
fn disposal_runs_cleanups_children_first() {
    let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
    let order = seen.clone();

    let disposer = create_root(|disposer| {
        let root_cleanup = order.clone();
        on_cleanup(move || root_cleanup.borrow_mut().push("root"));

        let outer = order.clone();
        create_effect(move |_: Option<&()>| {
            let a = outer.clone();
            on_cleanup(move || a.borrow_mut().push("outer-effect"));

            let inner = outer.clone();
            create_effect(move |_: Option<&()>| {
                let b = inner.clone();
                on_cleanup(move || b.borrow_mut().push("inner-effect"));
            });
        });

        disposer
    });

    assert!(seen.borrow().is_empty());
    disposer.dispose();
    assert_eq!(
        seen.borrow().as_slice(),
        ["inner-effect", "outer-effect", "root"]
    );
}

/// Reading a memo that is marked but not yet drained recomputes it on the
/// spot, and the queue does not run it a second time.
#[test]
fn a_stale_memo_read_resolves_immediately() {
    let (source, set_source) = create_signal(0);
    let (m2_runs, m2_counter) = counter();

    // m1 starts out reading only `source`; after the write it also reads
    // m2, which at that moment is still queued and stale
    let slot: Rc<Cell<Option<Memo<i32>>>> = Rc::new(Cell::new(None));
    let slot_read = slot.clone();
    let m1 = create_memo(move |_| {
        let s = source.get();
        if s > 0 {
            slot_read.get().map(|m| m.get()).unwrap_or(0) + 100
        } else {
            s
        }
    });
    let m2 = create_memo(move |_| {
        m2_counter.fetch_add(1, Ordering::SeqCst);
        source.get() * 2
    });
    slot.set(Some(m2));
    assert_eq!(m2_runs.load(Ordering::SeqCst), 1);

    set_source.set(1);

    // m1 saw the recomputed m2 (2), and m2 ran once, not twice
    assert_eq!(m1.get_untracked(), 102);
    assert_eq!(m2_runs.load(Ordering::SeqCst), 2);
}

/// An error absorbed by an ancestor handler does not disturb sibling
/// effects in the same flush.
#[test]
fn handled_errors_leave_siblings_alone() {
    let (flag, set_flag) = create_signal(0);
    let (sibling_runs, sibling_counter) = counter();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let log = seen.clone();
    create_root(|_| {
        on_error(move |err| log.borrow_mut().push(err.to_string()));

        create_fallible_effect(move |_: Option<&()>| {
            let n = flag.get();
            if n > 0 {
                Err(Boom(n))
            } else {
                Ok(())
            }
        });
        create_effect(move |_: Option<&()>| {
            flag.get();
            sibling_counter.fetch_add(1, Ordering::SeqCst);
        });
    });
    assert_eq!(sibling_runs.load(Ordering::SeqCst), 1);

    set_flag.set(1);

    assert_eq!(seen.borrow().as_slice(), ["boom at 1".to_string()]);
    assert_eq!(sibling_runs.load(Ordering::SeqCst), 2);
}

/// With no handler anywhere on the chain, the write that triggered the
/// failing run panics.
#[test]
#[should_panic(expected = "unhandled reactive error: boom at 1")]
fn an_unhandled_error_panics_at_the_triggering_write() {
    let (flag, set_flag) = create_signal(0);
    create_fallible_effect(move |_: Option<&()>| {
        let n = flag.get();
        if n > 0 {
            Err(Boom(n))
        } else {
            Ok(())
        }
    });
    set_flag.set(1);
}

/// Errors cross root boundaries upward: an inner root without handlers
/// defers to the outer root's.
#[test]
fn errors_climb_through_nested_roots() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let log = seen.clone();

    create_root(|_| {
        on_error(move |err| log.borrow_mut().push(err.to_string()));
        create_root(|_| {
            create_fallible_effect(|_: Option<&()>| -> Result<(), Boom> { Err(Boom(9)) });
        });
    });

    assert_eq!(seen.borrow().as_slice(), ["boom at 9".to_string()]);
}

/// Disposing twice is a no-op and unrelated state keeps working.
#[test]
fn double_disposal_is_harmless() {
    let (count, set_count) = create_signal(0);
    let disposer = create_root(|disposer| {
        create_effect(move |_: Option<&()>| {
            count.get();
        });
        disposer
    });

    disposer.dispose();
    disposer.dispose();

    set_count.set(1);
    assert_eq!(count.get(), 1);
}

/// A computation that stops reading a source is no longer notified by it.
#[test]
fn rewiring_stops_stale_notifications() {
    let (cond, set_cond) = create_signal(true);
    let (a, set_a) = create_signal(10);
    let (b, set_b) = create_signal(20);
    let (runs, run_counter) = counter();
    let last = Arc::new(AtomicI32::new(-1));

    let seen = last.clone();
    create_effect(move |_: Option<&()>| {
        run_counter.fetch_add(1, Ordering::SeqCst);
        let value = if cond.get() { a.get() } else { b.get() };
        seen.store(value, Ordering::SeqCst);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!((a.observer_count(), b.observer_count()), (1, 0));

    // the unread branch must not wake the effect
    set_b.set(21);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    set_cond.set(false);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(last.load(Ordering::SeqCst), 21);
    assert_eq!((a.observer_count(), b.observer_count()), (0, 1));

    set_a.set(11);
    assert_eq!(runs.load(Ordering::SeqCst), 2);

    set_b.set(22);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(last.load(Ordering::SeqCst), 22);
}

/// Render effects run before user effects in a pass, regardless of
/// subscription order.
#[test]
fn render_effects_run_before_user_effects() {
    let (tick, set_tick) = create_signal(0);
    let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let first = seen.clone();
    create_effect(move |_: Option<&()>| {
        tick.get();
        first.borrow_mut().push("user-1");
    });
    let second = seen.clone();
    create_effect(move |_: Option<&()>| {
        tick.get();
        second.borrow_mut().push("user-2");
    });
    // subscribes last, still runs first
    let third = seen.clone();
    create_render_effect(move |_: Option<&()>| {
        tick.get();
        third.borrow_mut().push("render");
    });

    seen.borrow_mut().clear();
    set_tick.set(1);

    assert_eq!(seen.borrow().as_slice(), ["render", "user-1", "user-2"]);
}

/// Effects created while the user tier is draining run in the same pass,
/// after the effects captured at pass start.
#[test]
fn effects_spawned_mid_pass_run_after_the_captured_set() {
    let (tick, set_tick) = create_signal(0);
    let seen: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

    let spawner_log = seen.clone();
    create_effect(move |_: Option<&()>| {
        tick.get();
        spawner_log.borrow_mut().push("spawner");
        let spawned_log = spawner_log.clone();
        create_effect(move |_: Option<&()>| {
            spawned_log.borrow_mut().push("spawned");
        });
    });
    let existing_log = seen.clone();
    create_effect(move |_: Option<&()>| {
        tick.get();
        existing_log.borrow_mut().push("existing");
    });

    seen.borrow_mut().clear();
    set_tick.set(1);

    assert_eq!(seen.borrow().as_slice(), ["spawner", "existing", "spawned"]);
}

/// A memo recomputing to an equal value stops the propagation right
/// there: downstream memos and effects are downgraded without re-running.
#[test]
fn an_equal_memo_result_stops_the_wave() {
    let (source, set_source) = create_signal(1);
    let (m1_runs, m1_counter) = counter();
    let (m2_runs, m2_counter) = counter();
    let (e_runs, e_counter) = counter();

    let residue = create_memo(move |_| {
        m1_counter.fetch_add(1, Ordering::SeqCst);
        source.get() % 3
    });
    let scaled = create_memo(move |_| {
        m2_counter.fetch_add(1, Ordering::SeqCst);
        residue.get() * 100
    });
    create_effect(move |_: Option<&()>| {
        scaled.get();
        e_counter.fetch_add(1, Ordering::SeqCst);
    });

    // 1 -> 4 keeps the residue at 1
    set_source.set(4);
    assert_eq!(m1_runs.load(Ordering::SeqCst), 2);
    assert_eq!(m2_runs.load(Ordering::SeqCst), 1);
    assert_eq!(e_runs.load(Ordering::SeqCst), 1);

    set_source.set(5);
    assert_eq!(m1_runs.load(Ordering::SeqCst), 3);
    assert_eq!(m2_runs.load(Ordering::SeqCst), 2);
    assert_eq!(e_runs.load(Ordering::SeqCst), 2);
}

/// A chain marked Pending behind a clamping memo settles back to Clean
/// without any of its members re-running.
#[test]
fn a_pending_chain_settles_without_rerunning() {
    let (level, set_level) = create_signal(50);
    let (clamp_runs, clamp_counter) = counter();
    let (label_runs, label_counter) = counter();
    let (e_runs, e_counter) = counter();

    let clamped = create_memo(move |_| {
        clamp_counter.fetch_add(1, Ordering::SeqCst);
        level.get().min(10)
    });
    let label = create_memo(move |_| {
        label_counter.fetch_add(1, Ordering::SeqCst);
        format!("level {}", clamped.get())
    });
    create_effect(move |_: Option<&()>| {
        label.with(|l| l.len());
        e_counter.fetch_add(1, Ordering::SeqCst);
    });

    // both stay clamped to 10
    set_level.set(60);
    assert_eq!(clamp_runs.load(Ordering::SeqCst), 2);
    assert_eq!(label_runs.load(Ordering::SeqCst), 1);
    assert_eq!(e_runs.load(Ordering::SeqCst), 1);

    // drops below the clamp: the whole chain wakes
    set_level.set(3);
    assert_eq!(clamp_runs.load(Ordering::SeqCst), 3);
    assert_eq!(label_runs.load(Ordering::SeqCst), 2);
    assert_eq!(e_runs.load(Ordering::SeqCst), 2);
}

/// Writes made by effects are staged and committed as a follow-up
/// transaction after the pass, not interleaved into it.
#[test]
fn effect_writes_commit_after_the_pass() {
    let (input, set_input) = create_signal(1);
    let (mirror, set_mirror) = create_signal(0);
    let (mirror_runs, mirror_counter) = counter();
    let last = Arc::new(AtomicI32::new(-1));

    create_effect(move |_: Option<&()>| {
        let v = input.get();
        set_mirror.set(v * 10);
    });
    let seen = last.clone();
    create_effect(move |_: Option<&()>| {
        seen.store(mirror.get(), Ordering::SeqCst);
        mirror_counter.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(last.load(Ordering::SeqCst), 10);

    set_input.set(2);

    assert_eq!(last.load(Ordering::SeqCst), 20);
    assert_eq!(mirror_runs.load(Ordering::SeqCst), 2);
}

/// Reading a signal after its owning root was disposed panics with a
/// descriptive message.
#[test]
#[should_panic(expected = "read of a disposed reactive cell")]
fn reading_a_disposed_signal_panics() {
    let (count, disposer) = create_root(|disposer| {
        let (count, _set_count) = create_signal(7);
        (count, disposer)
    });
    disposer.dispose();
    count.get();
}
