//! Owner restoration across await points.
//!
//! The runtime is single-threaded, so these run on a current-thread tokio
//! runtime with local tasks.

use std::cell::Cell;
use std::rc::Rc;

use filament_core::{create_root, effect, get_owner, run_with_owner, signal};
use tokio::task::LocalSet;

#[tokio::test(flavor = "current_thread")]
async fn owner_is_lost_across_await_and_restored_explicitly() {
    let count = signal(0);
    let runs = Rc::new(Cell::new(0));

    let (owner, dispose) = create_root(|dispose| (get_owner().unwrap(), dispose));
    tokio::task::yield_now().await;

    // Nothing is ambient after resuming.
    assert!(get_owner().is_none());

    {
        let (count, runs) = (count.clone(), runs.clone());
        run_with_owner(owner, move || {
            effect(move || {
                count.get();
                runs.set(runs.get() + 1);
            });
        });
    }
    assert_eq!(owner.child_count(), 1);

    count.set(1);
    assert_eq!(runs.get(), 2);

    dispose.dispose();
    count.set(2);
    assert_eq!(runs.get(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn late_callback_after_teardown_is_a_no_op() {
    let local = LocalSet::new();
    let count = signal(0);
    let runs = Rc::new(Cell::new(0));

    let (owner, dispose) = create_root(|dispose| (get_owner().unwrap(), dispose));

    let task = {
        let (count, runs) = (count.clone(), runs.clone());
        local.spawn_local(async move {
            tokio::task::yield_now().await;
            run_with_owner(owner, move || {
                effect(move || {
                    count.get();
                    runs.set(runs.get() + 1);
                });
            });
        })
    };

    // The island is torn down before the task resumes.
    dispose.dispose();
    local.run_until(task).await.unwrap();

    assert_eq!(runs.get(), 0);
    count.set(1);
    assert_eq!(runs.get(), 0);
    assert_eq!(count.subscriber_count(), 0);
}
