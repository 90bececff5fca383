//! The per-session protocol engine.
//!
//! A [`Session`] owns all protocol state for one conversation and performs
//! no I/O of its own: the host pushes inbound datagrams via
//! [`input`](Session::input), pulls application data via
//! [`recv`](Session::recv), and drives time via
//! [`update`](Session::update), which emits outbound datagrams through the
//! installed [`DatagramSink`].

use std::cmp::min;

use tracing::{debug, trace, warn};

use crate::config::{SessionConfig, INTERVAL_MAX, INTERVAL_MIN, RECEIVE_WINDOW_MIN};
use crate::congestion::CongestionController;
use crate::error::{ConfigError, InputError, RecvError, SendError};
use crate::packer::DatagramPacker;
use crate::probe::WindowProbe;
use crate::recv_window::ReceiveWindow;
use crate::rtt::{RttEstimator, RTO_MIN_NODELAY, RTO_MIN_NORMAL};
use crate::segment::Segment;
use crate::send_window::{FlushPolicy, SendStamp, SendWindow};
use crate::seq::{seq_before, seq_diff};
use crate::sink::DatagramSink;
use crate::wire::{Command, SegmentHeader, HEADER_LEN, MIN_MTU};

/// Timer distance treated as a clock discontinuity rather than elapsed
/// time.
const CLOCK_JUMP_MS: i32 = 10_000;

/// Upper bound on fast-retransmit attempts per segment.
const FAST_ACK_LIMIT: u32 = 5;

pub struct Session {
    conv: u32,
    mtu: usize,
    mss: usize,

    snd: SendWindow,
    rcv: ReceiveWindow,
    /// `(sn, ts)` pairs to acknowledge at the next flush.
    ack_list: Vec<(u32, u32)>,

    rtt: RttEstimator,
    congestion: CongestionController,
    probe: WindowProbe,

    /// Configured send window in segments.
    snd_wnd: u16,
    /// The peer's most recently advertised receive window.
    rmt_wnd: u16,

    current: u32,
    interval: u32,
    ts_flush: u32,
    /// Becomes true on the first `update`; `flush` is inert before that.
    updated: bool,

    nodelay: u32,
    fast_resend: u32,
    no_cwnd: bool,
    stream: bool,

    dead_link: u32,
    /// Timeout retransmissions over the session lifetime.
    retransmissions: u32,
    alive: bool,

    packer: DatagramPacker,
    output: Option<Box<dyn DatagramSink>>,
}

impl Session {
    /// Create a session for conversation `conv`. Both endpoints must use
    /// the same `conv`; it is the only thing that pairs them.
    pub fn new(conv: u32, config: SessionConfig) -> anyhow::Result<Session> {
        config.validate()?;

        let mut rtt = RttEstimator::new();
        rtt.set_min_rto(if config.nodelay != 0 { RTO_MIN_NODELAY } else { RTO_MIN_NORMAL });

        let interval = config.interval.clamp(INTERVAL_MIN, INTERVAL_MAX);

        Ok(Session {
            conv,
            mtu: config.mtu,
            mss: config.mtu - HEADER_LEN,
            snd: SendWindow::new(),
            rcv: ReceiveWindow::new(config.receive_window.max(RECEIVE_WINDOW_MIN)),
            ack_list: Vec::new(),
            rtt,
            congestion: CongestionController::new(),
            probe: WindowProbe::new(),
            snd_wnd: config.send_window,
            // assume the protocol default until the peer advertises
            rmt_wnd: RECEIVE_WINDOW_MIN,
            current: 0,
            interval,
            ts_flush: interval,
            updated: false,
            nodelay: config.nodelay,
            fast_resend: config.fast_resend,
            no_cwnd: config.no_congestion_window,
            stream: config.stream,
            dead_link: config.dead_link,
            retransmissions: 0,
            alive: true,
            packer: DatagramPacker::new(config.mtu),
            output: None,
        })
    }

    pub fn conv(&self) -> u32 {
        self.conv
    }

    /// `false` once any single segment has been transmitted `dead_link`
    /// times without acknowledgement; the peer is presumed gone. The
    /// session keeps its state so the caller can inspect and discard it.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Install the sink that receives outbound datagrams.
    pub fn set_output(&mut self, sink: impl DatagramSink + 'static) {
        self.output = Some(Box::new(sink));
    }

    /// Change the MTU; the MSS follows as `mtu - 24`.
    pub fn set_mtu(&mut self, mtu: usize) -> Result<(), ConfigError> {
        if mtu < MIN_MTU {
            return Err(ConfigError::MtuTooSmall(mtu));
        }
        self.mtu = mtu;
        self.mss = mtu - HEADER_LEN;
        self.packer.set_mtu(mtu);
        Ok(())
    }

    /// Change the flush cadence, clamped to 10..=5000 ms.
    pub fn set_interval(&mut self, interval: u32) {
        self.interval = interval.clamp(INTERVAL_MIN, INTERVAL_MAX);
    }

    /// Switch latency profiles on a live session. `None` leaves the
    /// respective knob untouched; `no_cwnd` is always applied.
    pub fn set_nodelay(
        &mut self,
        nodelay: Option<u32>,
        interval: Option<u32>,
        resend: Option<u32>,
        no_cwnd: bool,
    ) {
        if let Some(nodelay) = nodelay {
            self.nodelay = nodelay;
            self.rtt.set_min_rto(if nodelay != 0 { RTO_MIN_NODELAY } else { RTO_MIN_NORMAL });
        }
        if let Some(interval) = interval {
            self.set_interval(interval);
        }
        if let Some(resend) = resend {
            self.fast_resend = resend;
        }
        self.no_cwnd = no_cwnd;
    }

    /// Resize the windows; zero leaves a side unchanged, and the receive
    /// window never shrinks below 128 segments.
    pub fn set_window_size(&mut self, send: u16, receive: u16) {
        if send > 0 {
            self.snd_wnd = send;
        }
        if receive > 0 {
            self.rcv.set_window(receive.max(RECEIVE_WINDOW_MIN));
        }
    }

    pub fn set_stream(&mut self, stream: bool) {
        self.stream = stream;
    }

    pub fn set_fast_resend(&mut self, resend: u32) {
        self.fast_resend = resend;
    }

    pub fn set_min_rto(&mut self, min_rto: u32) {
        self.rtt.set_min_rto(min_rto);
    }

    /// Segments waiting to be sent or acknowledged; the caller's handle
    /// for back-pressure.
    pub fn pending_send(&self) -> usize {
        self.snd.pending()
    }

    /// Timeout retransmissions over the session lifetime; a rough link
    /// quality indicator.
    pub fn retransmissions(&self) -> u32 {
        self.retransmissions
    }

    /// Queue one message (fragmenting as needed) for transmission at the
    /// next flush.
    pub fn send(&mut self, data: &[u8]) -> Result<(), SendError> {
        self.snd.push(data, self.mss, self.stream, self.rcv.window() as usize)
    }

    /// Length of the next complete message, without consuming it.
    pub fn peek_size(&self) -> Option<usize> {
        self.rcv.peek_size()
    }

    /// Drain the next complete message into `buf`, returning its length.
    pub fn recv(&mut self, buf: &mut [u8]) -> Result<usize, RecvError> {
        let was_saturated = self.rcv.is_saturated();

        let len = self.rcv.read(buf)?;
        self.rcv.advance();

        if was_saturated && !self.rcv.is_saturated() {
            // we advertised a zero window before this drain; announce the
            // reopened window instead of waiting to piggyback on data
            self.probe.request_tell();
        }
        Ok(len)
    }

    /// Feed one inbound datagram. Segments are consumed in order until the
    /// datagram is exhausted or malformed; duplicates and out-of-window
    /// data are dropped silently.
    pub fn input(&mut self, data: &[u8]) -> Result<(), InputError> {
        trace!("input of {} bytes", data.len());
        if data.len() < HEADER_LEN || data.len() > i32::MAX as usize {
            return Err(InputError::Malformed);
        }

        let prev_una = self.snd.una();
        let mut max_ack: Option<(u32, u32)> = None;

        let mut rest = data;
        while rest.len() >= HEADER_LEN {
            let mut cursor = rest;
            let header = SegmentHeader::deser(&mut cursor)?;
            rest = &rest[HEADER_LEN..];

            if header.conv != self.conv {
                debug!("dropping datagram of foreign conversation {:#010x}", header.conv);
                return Err(InputError::Malformed);
            }
            if rest.len() < header.len as usize {
                debug!(
                    "segment sn {} declares {} payload bytes but {} remain",
                    header.sn,
                    header.len,
                    rest.len()
                );
                return Err(InputError::Truncated);
            }
            let command = header.command()?;

            self.rmt_wnd = header.wnd;
            self.snd.ack_cumulative(header.una);

            match command {
                Command::Ack => {
                    if seq_diff(self.current, header.ts) >= 0 {
                        self.rtt.on_sample(self.current.wrapping_sub(header.ts), self.interval);
                    }
                    self.snd.ack_segment(header.sn);
                    max_ack = match max_ack {
                        Some((sn, _)) if seq_diff(header.sn, sn) <= 0 => max_ack,
                        _ => Some((header.sn, header.ts)),
                    };
                    trace!("ack of sn {}", header.sn);
                }
                Command::Push => {
                    trace!("push sn {} with {} payload bytes", header.sn, header.len);
                    if seq_diff(header.sn, self.rcv.next_sn().wrapping_add(self.rcv.window() as u32)) < 0 {
                        // acknowledge even duplicates, or the peer keeps
                        // retransmitting them
                        self.ack_list.push((header.sn, header.ts));
                        if !seq_before(header.sn, self.rcv.next_sn()) {
                            let payload = rest[..header.len as usize].to_vec();
                            self.rcv.on_data(Segment::from_wire(header, payload));
                        }
                    }
                }
                Command::WindowAsk => {
                    trace!("peer probes our window");
                    self.probe.request_tell();
                }
                Command::WindowTell => {
                    // nothing to do: the advertised window was already
                    // captured above
                }
            }

            rest = &rest[header.len as usize..];
        }

        if let Some((sn, _ts)) = max_ack {
            self.snd.apply_fast_acks(sn);
        }

        if seq_diff(self.snd.una(), prev_una) > 0 {
            self.congestion.on_ack_advance(self.mss as u32, self.rmt_wnd as u32);
        }

        Ok(())
    }

    /// Drive the engine to `current` milliseconds. Flushes whenever the
    /// flush timer has elapsed; a clock discontinuity (more than 10 s away
    /// from the schedule in either direction) realigns the timer instead
    /// of producing a burst of catch-up flushes.
    pub fn update(&mut self, current: u32) {
        self.current = current;

        if !self.updated {
            self.updated = true;
            self.ts_flush = current.wrapping_add(self.interval);
        }

        let mut slap = seq_diff(current, self.ts_flush);
        if slap >= CLOCK_JUMP_MS || slap < -CLOCK_JUMP_MS {
            warn!("flush timer is {} ms off; treating as clock jump", slap);
            self.ts_flush = current;
            slap = 0;
        }

        if slap >= 0 {
            self.ts_flush = self.ts_flush.wrapping_add(self.interval);
            if seq_diff(current, self.ts_flush) >= self.interval as i32 {
                // more than one interval behind: skip ahead
                self.ts_flush = current.wrapping_add(self.interval);
            }
            self.flush();
        }
    }

    /// Earliest time another `update` call is useful, clamped into
    /// `[current, current + interval]`. Lets the host sleep instead of
    /// polling.
    pub fn check(&self, current: u32) -> u32 {
        if !self.updated {
            return current;
        }

        let mut ts_flush = self.ts_flush;
        let slap = seq_diff(current, ts_flush);
        if slap >= CLOCK_JUMP_MS || slap < -CLOCK_JUMP_MS {
            ts_flush = current;
        }
        if seq_diff(current, ts_flush) >= 0 {
            return current;
        }

        let tm_flush = seq_diff(ts_flush, current);
        let tm_packet = match self.snd.earliest_resend(current) {
            Some(0) => return current,
            Some(diff) => diff,
            None => i32::MAX,
        };

        let minimal = min(min(tm_packet, tm_flush), self.interval as i32);
        current.wrapping_add(minimal as u32)
    }

    /// Emit everything due: pending ACKs, window probes, fresh data under
    /// the transmit window, and retransmissions. Called from `update`;
    /// callers needing tighter control (e.g. right after `send`) may call
    /// it directly once `update` has run at least once.
    pub fn flush(&mut self) {
        if !self.updated {
            return;
        }
        let Some(output) = self.output.as_mut() else {
            debug!("flush without an installed output sink; state stays queued");
            return;
        };
        let sink: &mut dyn DatagramSink = &mut **output;

        let wnd_unused = self.rcv.unused_slots();
        let rcv_nxt = self.rcv.next_sn();

        // pending acknowledgements
        let mut control = SegmentHeader {
            conv: self.conv,
            cmd: Command::Ack.into(),
            wnd: wnd_unused,
            una: rcv_nxt,
            ..SegmentHeader::default()
        };
        for &(sn, ts) in &self.ack_list {
            control.sn = sn;
            control.ts = ts;
            self.packer.push(&control, &[], sink);
        }
        self.ack_list.clear();

        // window probing
        self.probe.update(self.current, self.rmt_wnd);
        let (ask, tell) = self.probe.take_requests();
        control.sn = 0;
        control.ts = 0;
        if ask {
            debug!("probing the peer's zero window");
            control.cmd = Command::WindowAsk.into();
            self.packer.push(&control, &[], sink);
        }
        if tell {
            debug!("advertising a window of {} slots", wnd_unused);
            control.cmd = Command::WindowTell.into();
            self.packer.push(&control, &[], sink);
        }

        // promote under the effective transmit window
        let mut window = min(self.snd_wnd, self.rmt_wnd) as u32;
        if !self.no_cwnd {
            window = min(window, self.congestion.window());
        }
        self.snd.promote(
            window,
            SendStamp {
                conv: self.conv,
                current: self.current,
                rto: self.rtt.rto(),
                wnd: wnd_unused,
                una: rcv_nxt,
            },
        );

        // transmit and retransmit data
        let policy = FlushPolicy {
            current: self.current,
            rto: self.rtt.rto(),
            rto_min_slack: if self.nodelay == 0 { self.rtt.rto() >> 3 } else { 0 },
            nodelay: self.nodelay != 0,
            resend_trigger: if self.fast_resend > 0 { self.fast_resend } else { u32::MAX },
            fast_limit: FAST_ACK_LIMIT,
            wnd: wnd_unused,
            una: rcv_nxt,
            dead_link: self.dead_link,
        };
        let packer = &mut self.packer;
        let outcome = self.snd.flush_data(policy, |seg| {
            packer.push(&seg.header, &seg.payload, sink);
        });
        packer.flush(sink);

        self.retransmissions += outcome.timeout_resends;
        if outcome.dead && self.alive {
            warn!(
                "segment exceeded {} transmissions without acknowledgement; marking session dead",
                self.dead_link
            );
            self.alive = false;
        }

        // congestion reaction to what the walk observed
        if outcome.fast_resent {
            self.congestion.on_fast_retransmit(self.snd.inflight(), policy.resend_trigger, self.mss as u32);
        }
        if outcome.lost {
            self.congestion.on_loss(self.mss as u32);
        }
        self.congestion.floor(self.mss as u32);
    }

    #[cfg(test)]
    fn min_rto(&self) -> u32 {
        self.rtt.min_rto()
    }
}
