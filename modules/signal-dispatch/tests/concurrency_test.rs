//! Threads and re-entrant receivers.
//! The registry lock is never held across a receiver call, so receivers may
//! use the signal they were called from.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use signal_dispatch::{DispatchUid, Receiver, ReceiverFn, Signal};

type Sig = Signal<u64, u32, u32>;

// ---------------------------------------------------------------------------
// Re-entrancy
// ---------------------------------------------------------------------------

#[test]
fn receiver_can_connect_during_dispatch() {
    let signal = Sig::new();
    let late_calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&late_calls);
    let connector = Receiver::new(move |sig: &Sig, _, _| {
        let counter = Arc::clone(&counter);
        let late = Receiver::new(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(0)
        });
        sig.connect(late, None, Some(DispatchUid::new("late")))?;
        Ok(1)
    });
    signal.connect(connector, None, None).unwrap();

    // The snapshot was taken before `late` existed.
    signal.send(None, &0).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(signal.receiver_count(), 2);

    signal.send(None, &0).unwrap();
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    assert_eq!(signal.receiver_count(), 2);
}

#[test]
fn receiver_can_disconnect_itself() {
    let signal = Sig::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&calls);
    let once = Receiver::new(move |sig: &Sig, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        sig.disconnect_uid("once".into(), None);
        Ok(0)
    });
    signal.connect(once, None, Some("once".into())).unwrap();

    signal.send(None, &0).unwrap();
    signal.send(None, &0).unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(signal.is_empty());
}

#[test]
fn receiver_can_send_on_its_own_signal() {
    let signal = Sig::new();
    let depth_seen = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&depth_seen);
    let recursive = Receiver::new(move |sig: &Sig, sender: Option<&u64>, depth: &u32| {
        seen.fetch_max(*depth as usize, Ordering::SeqCst);
        if *depth < 3 {
            sig.send(sender, &(depth + 1))?;
        }
        Ok(*depth)
    });
    signal.connect(recursive, None, None).unwrap();

    signal.send(Some(&7), &0).unwrap();
    assert_eq!(depth_seen.load(Ordering::SeqCst), 3);
}

// ---------------------------------------------------------------------------
// Threads
// ---------------------------------------------------------------------------

#[test]
fn concurrent_connect_and_send_keep_registry_consistent() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 50;

    let signal = Arc::new(Sig::named("concurrent"));
    let barrier = Arc::new(Barrier::new(THREADS as usize * 2));
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for t in 0..THREADS {
        let connect_signal = Arc::clone(&signal);
        let connect_barrier = Arc::clone(&barrier);
        let connect_calls = Arc::clone(&calls);
        handles.push(thread::spawn(move || {
            connect_barrier.wait();
            for i in 0..PER_THREAD {
                let calls = Arc::clone(&connect_calls);
                let receiver = Receiver::new(move |_, _, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(0)
                });
                let sender = t * PER_THREAD + i;
                connect_signal.connect(receiver, Some(&sender), None).unwrap();
            }
        }));

        let send_signal = Arc::clone(&signal);
        let send_barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            send_barrier.wait();
            for i in 0..PER_THREAD {
                let _ = send_signal.send(Some(&(t * PER_THREAD + i)), &0).unwrap();
                let _ = send_signal.send_robust(None, &0);
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(signal.receiver_count(), (THREADS * PER_THREAD) as usize);

    // Each receiver is scoped to its own sender: one dispatch each, one call each.
    let before = calls.load(Ordering::SeqCst);
    for sender in 0..THREADS * PER_THREAD {
        assert_eq!(signal.send(Some(&sender), &0).unwrap().len(), 1);
    }
    assert_eq!(calls.load(Ordering::SeqCst) - before, (THREADS * PER_THREAD) as usize);
}

#[test]
fn concurrent_duplicate_connects_store_one_entry() {
    let signal = Arc::new(Sig::new());
    let shared = Receiver::new(|_, _, _| Ok(1));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let signal = Arc::clone(&signal);
            let shared = shared.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                signal.connect(shared, Some(&1), None).unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(signal.receiver_count(), 1);
    assert_eq!(signal.send(Some(&1), &0).unwrap()[&shared], 1);
}

#[test]
fn disconnect_and_purge_race_with_dispatch() {
    const CHURNERS: usize = 4;
    const DISPATCHERS: usize = 4;
    const ROUNDS: usize = 200;

    let signal = Arc::new(Sig::named("churn"));
    let steady_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&steady_calls);
    let steady = Receiver::new(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    });
    signal.connect(steady.clone(), None, None).unwrap();

    let barrier = Arc::new(Barrier::new(CHURNERS + DISPATCHERS));
    let mut handles = Vec::new();

    for c in 0..CHURNERS {
        let churn_signal = Arc::clone(&signal);
        let churn_barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            churn_barrier.wait();
            for round in 0..ROUNDS {
                // Explicit connect/disconnect of a strong receiver.
                let transient = Receiver::new(|_, _, n: &u32| Ok(*n));
                churn_signal.connect(transient.clone(), None, None).unwrap();
                assert!(churn_signal.disconnect(&transient, None, None));

                // A weak receiver whose target dies; left for dispatch to purge.
                let target: Arc<ReceiverFn<u64, u32, u32>> = Arc::new(|_, _, n| Ok(*n));
                let sender = (c * ROUNDS + round) as u64 % 3;
                churn_signal
                    .connect(Receiver::weak(&target), Some(&sender), None)
                    .unwrap();
                churn_signal
                    .connect(Receiver::weak(&target), None, None)
                    .unwrap();
                drop(target);
            }
        }));
    }

    for d in 0..DISPATCHERS {
        let send_signal = Arc::clone(&signal);
        let send_barrier = Arc::clone(&barrier);
        let steady = steady.clone();
        handles.push(thread::spawn(move || {
            send_barrier.wait();
            for round in 0..ROUNDS {
                let sender = ((d + round) % 3) as u64;
                let responses = send_signal.send_robust(Some(&sender), &0);
                // Dead weak receivers never show up; the steady one always does.
                assert!(matches!(responses.get(&steady), Some(Ok(1))));
                assert!(responses.values().all(|result| result.is_ok()));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // Sweep every sender scope so all dead weak receivers are purged.
    for sender in 0..3u64 {
        signal.send_robust(Some(&sender), &0);
    }

    assert_eq!(signal.receiver_count(), 1);
    assert_eq!(
        steady_calls.load(Ordering::SeqCst),
        DISPATCHERS * ROUNDS + 3
    );
    let responses = signal.send(None, &0).unwrap();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[&steady], 1);
}
