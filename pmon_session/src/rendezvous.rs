// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

use std::sync::Condvar;
use std::sync::Mutex;

/// Turn-taking barrier for ordered result printing.
///
/// Workers finish in arbitrary order, but per-CPU result blocks must
/// appear in CPU order. Each worker calls [`Rendezvous::wait_turn`] with
/// its logical id, prints, then calls [`Rendezvous::finish_turn`] to
/// release the next one.
#[derive(Debug)]
pub struct Rendezvous {
    turn: Mutex<usize>,
    cond: Condvar,
}

impl Rendezvous {
    /// Creates a rendezvous whose first turn is id 0.
    pub fn new() -> Rendezvous {
        return Rendezvous {
            turn: Mutex::new(0),
            cond: Condvar::new(),
        };
    }

    /// Blocks until it is `id`'s turn.
    pub fn wait_turn(&self, id: usize) {
        let mut turn = self.turn.lock().unwrap();
        while *turn != id {
            turn = self.cond.wait(turn).unwrap();
        }
    }

    /// Ends `id`'s turn and wakes the waiter for `id + 1`.
    pub fn finish_turn(&self, id: usize) {
        let mut turn = self.turn.lock().unwrap();
        debug_assert_eq!(*turn, id);
        *turn = id + 1;
        self.cond.notify_all();
    }
}

impl Default for Rendezvous {
    fn default() -> Rendezvous {
        return Rendezvous::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Threads started and delayed out of order still emit in id order.
    #[test]
    fn shuffled_completion_prints_in_order() {
        let rendezvous = Arc::new(Rendezvous::new());
        let output = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for (id, delay_ms) in [(3usize, 0u64), (0, 30), (2, 10), (1, 20)] {
            let rendezvous = Arc::clone(&rendezvous);
            let output = Arc::clone(&output);
            handles.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(delay_ms));
                rendezvous.wait_turn(id);
                output.lock().unwrap().push(id);
                rendezvous.finish_turn(id);
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(vec![0, 1, 2, 3], *output.lock().unwrap());
    }
}
