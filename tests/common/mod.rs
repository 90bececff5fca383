//! A deterministic in-memory network between two endpoints, with seeded
//! loss and latency, driven by the same virtual millisecond clock as the
//! sessions under test.
#![allow(dead_code)] // not every test binary uses every helper

use std::cell::RefCell;
use std::rc::Rc;

use arq_session::FnSink;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct Medium {
    rng: StdRng,
    loss_percent: u32,
    delay_min: u32,
    delay_max: u32,
    now: u32,
    /// `(deliver_at, tiebreak, destination, datagram)`
    in_flight: Vec<(u32, u64, usize, Vec<u8>)>,
    next_tiebreak: u64,
}

impl Medium {
    pub fn new(seed: u64, loss_percent: u32, delay_min: u32, delay_max: u32) -> Medium {
        Medium {
            rng: StdRng::seed_from_u64(seed),
            loss_percent,
            delay_min,
            delay_max,
            now: 0,
            in_flight: Vec::new(),
            next_tiebreak: 0,
        }
    }

    /// Instant, reliable delivery.
    pub fn lossless() -> Medium {
        Medium::new(7, 0, 0, 0)
    }

    pub fn set_now(&mut self, now: u32) {
        self.now = now;
    }

    /// Inject a datagram addressed to endpoint `to`, applying the loss and
    /// delay model.
    pub fn send(&mut self, to: usize, datagram: &[u8]) {
        if self.loss_percent > 0 && self.rng.gen_range(0..100) < self.loss_percent {
            return;
        }
        let delay = if self.delay_max > self.delay_min {
            self.rng.gen_range(self.delay_min..=self.delay_max)
        } else {
            self.delay_min
        };
        self.in_flight.push((self.now + delay, self.next_tiebreak, to, datagram.to_vec()));
        self.next_tiebreak += 1;
    }

    /// Take the next due datagram addressed to `to`; earliest delivery
    /// time first, send order among ties.
    pub fn recv(&mut self, to: usize) -> Option<Vec<u8>> {
        let mut best: Option<usize> = None;
        for (idx, (at, tiebreak, dest, _)) in self.in_flight.iter().enumerate() {
            if *dest != to || *at > self.now {
                continue;
            }
            best = match best {
                None => Some(idx),
                Some(prev) => {
                    let (prev_at, prev_tiebreak, ..) = self.in_flight[prev];
                    if (*at, *tiebreak) < (prev_at, prev_tiebreak) {
                        Some(idx)
                    } else {
                        Some(prev)
                    }
                }
            };
        }
        best.map(|idx| self.in_flight.remove(idx).3)
    }
}

pub type SharedMedium = Rc<RefCell<Medium>>;

pub fn shared(medium: Medium) -> SharedMedium {
    Rc::new(RefCell::new(medium))
}

/// A datagram sink that injects into the medium, addressed to `to`.
pub fn sink_to(medium: &SharedMedium, to: usize) -> FnSink<impl FnMut(&[u8])> {
    let medium = medium.clone();
    FnSink(move |datagram: &[u8]| medium.borrow_mut().send(to, datagram))
}
