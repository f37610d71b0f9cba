use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Live counter state for the MBC3 real-time clock.
///
/// The day counter is 9 bits wide; wrapping past 511 sets the carry flag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RtcCounters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days: u16,
    pub halted: bool,
    pub carry: bool,
}

impl RtcCounters {
    /// Advance the live counters by one second with full carry cascade.
    pub fn tick_second(&mut self) {
        self.seconds += 1;
        if self.seconds < 60 {
            return;
        }
        self.seconds = 0;
        self.minutes += 1;
        if self.minutes < 60 {
            return;
        }
        self.minutes = 0;
        self.hours += 1;
        if self.hours < 24 {
            return;
        }
        self.hours = 0;
        self.days += 1;
        if self.days >= 0x200 {
            self.days = 0;
            self.carry = true;
        }
    }

    /// Apply elapsed wall-clock time, field by field with carry propagation.
    ///
    /// Used when reloading a battery save: the day counter may wrap the
    /// 9-bit range more than once on a long-idle save, so the 512-day
    /// modulus is applied repeatedly.
    pub fn advance(&mut self, elapsed: Duration) {
        let total = elapsed.as_secs();

        self.seconds += (total % 60) as u8;
        if self.seconds >= 60 {
            self.seconds -= 60;
            self.minutes += 1;
        }

        self.minutes += (total / 60 % 60) as u8;
        if self.minutes >= 60 {
            self.minutes -= 60;
            self.hours += 1;
        }

        self.hours += (total / 3600 % 24) as u8;
        if self.hours >= 24 {
            self.hours -= 24;
            self.days += 1;
        }

        let mut days = u64::from(self.days) + total / 86400;
        while days >= 0x200 {
            days -= 0x200;
            self.carry = true;
        }
        self.days = days as u16;
    }
}

struct Shared {
    counters: Mutex<RtcCounters>,
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// MBC3 real-time clock.
///
/// Live counters are shared with a background ticker thread that increments
/// them once per elapsed second while the clock is not halted. Register
/// reads return a latched snapshot that only changes on an explicit latch
/// pulse, so software sees a coherent time even across a tick.
pub struct Rtc {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
    latched: RtcCounters,
    time_latched: bool,
}

impl Rtc {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            counters: Mutex::new(RtcCounters::default()),
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });
        let ticker = Some(Self::spawn_ticker(Arc::clone(&shared)));
        Self {
            shared,
            ticker,
            latched: RtcCounters::default(),
            time_latched: false,
        }
    }

    fn spawn_ticker(shared: Arc<Shared>) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut stopped = shared.stopped.lock().unwrap();
            loop {
                let (guard, timeout) = shared
                    .wake
                    .wait_timeout(stopped, Duration::from_secs(1))
                    .unwrap();
                stopped = guard;
                if *stopped {
                    break;
                }
                if timeout.timed_out() {
                    let mut counters = shared.counters.lock().unwrap();
                    if !counters.halted {
                        counters.tick_second();
                    }
                }
            }
        })
    }

    /// Read one of the clock registers selected through the cartridge's
    /// RAM-bank register (0x08..=0x0C).
    pub fn read_reg(&self, reg: u8) -> u8 {
        match reg {
            0x08 => self.latched.seconds,
            0x09 => self.latched.minutes,
            0x0A => self.latched.hours,
            0x0B => (self.latched.days & 0xFF) as u8,
            0x0C => {
                let live = self.shared.counters.lock().unwrap();
                ((self.latched.days >> 8) & 1) as u8
                    | if live.carry { 0x80 } else { 0 }
                    | if live.halted { 0x40 } else { 0 }
            }
            _ => 0,
        }
    }

    /// Write one of the clock registers. Out-of-range counter values reset
    /// the field to zero rather than being rejected.
    pub fn write_reg(&mut self, reg: u8, val: u8) {
        let mut live = self.shared.counters.lock().unwrap();
        match reg {
            0x08 => live.seconds = if val >= 60 { 0 } else { val },
            0x09 => live.minutes = if val >= 60 { 0 } else { val },
            0x0A => live.hours = if val >= 24 { 0 } else { val },
            0x0B => live.days = (live.days & 0x100) | u16::from(val),
            0x0C => {
                live.days = (live.days & 0xFF) | (u16::from(val & 1) << 8);
                live.carry = val & 0x80 != 0;
                live.halted = val & 0x40 != 0;
            }
            _ => {}
        }
    }

    /// Copy the live counters into the latched snapshot. Idempotent until
    /// re-armed by [`Rtc::unlatch`].
    pub fn latch(&mut self) {
        if !self.time_latched {
            self.latched = *self.shared.counters.lock().unwrap();
            self.time_latched = true;
        }
    }

    /// Re-arm latching so the next latch pulse takes a fresh snapshot.
    pub fn unlatch(&mut self) {
        self.time_latched = false;
    }

    /// Snapshot the live counters (used by battery persistence).
    pub fn counters(&self) -> RtcCounters {
        *self.shared.counters.lock().unwrap()
    }

    /// Restore counters from a battery save, back-filling the wall-clock
    /// time elapsed since `saved` seconds after the Unix epoch unless the
    /// clock was halted at save time.
    pub fn restore(&mut self, mut counters: RtcCounters, saved: u64) {
        if !counters.halted {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            if now > saved {
                counters.advance(Duration::from_secs(now - saved));
            }
        }
        *self.shared.counters.lock().unwrap() = counters;
        self.latched = counters;
    }
}

impl Default for Rtc {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Rtc {
    fn drop(&mut self) {
        *self.shared.stopped.lock().unwrap() = true;
        self.shared.wake.notify_all();
        if let Some(handle) = self.ticker.take() {
            let _ = handle.join();
        }
    }
}
