//! DTR/RTS to BOOT/RESET translation with a debounce for DTR=1, RTS=1.
//!
//! Flashing tools reset a target into its bootloader by switching the host
//! serial port from DTR=0/RTS=1 to DTR=1/RTS=0. Host drivers often report a
//! short DTR=1/RTS=1 in between. Applying it would release both lines and
//! abort the sequence, so that state only takes effect once it has been
//! stable for the debounce interval.
//!
//! | DTR | RTS | BOOT | RESET |
//! |-----|-----|------|-------|
//! | 0   | 0   | 1    | 1     |
//! | 0   | 1   | 1    | 0     |
//! | 1   | 0   | 0    | 1     |
//! | 1   | 1   | 1    | 1 (deferred) |

use core::cell::RefCell;

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer};
use embedded_hal::digital::{OutputPin, PinState};

use crate::bridge::BridgeError;

/// Levels driven on the target's BOOT and RESET inputs (`true` = high).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TargetLines {
    pub boot: bool,
    pub reset: bool,
}

impl TargetLines {
    /// Both lines inactive: the target runs normally.
    pub const RELEASED: Self = Self {
        boot: true,
        reset: true,
    };
    /// Target held in reset.
    pub const RESET: Self = Self {
        boot: true,
        reset: false,
    };
    /// Bootloader selected, target running.
    pub const BOOTLOADER: Self = Self {
        boot: false,
        reset: true,
    };
}

/// What to do with a new DTR/RTS sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    /// Drive these levels now.
    Apply(TargetLines),
    /// Drive these levels only if no other sample arrives first.
    Defer(TargetLines),
}

/// Map a DTR/RTS sample onto the target lines.
#[must_use]
pub const fn decode(dtr: bool, rts: bool) -> Transition {
    match (dtr, rts) {
        (false, false) => Transition::Apply(TargetLines::RELEASED),
        (false, true) => Transition::Apply(TargetLines::RESET),
        (true, false) => Transition::Apply(TargetLines::BOOTLOADER),
        (true, true) => Transition::Defer(TargetLines::RELEASED),
    }
}

struct Lines<B, R> {
    boot: B,
    reset: R,
    driven: TargetLines,
    pending: Option<(Instant, TargetLines)>,
}

impl<B: OutputPin, R: OutputPin> Lines<B, R> {
    fn drive(&mut self, target: TargetLines) -> Result<(), BridgeError> {
        self.boot
            .set_state(PinState::from(target.boot))
            .map_err(|_| BridgeError::Gpio)?;
        self.reset
            .set_state(PinState::from(target.reset))
            .map_err(|_| BridgeError::Gpio)?;
        self.driven = target;
        Ok(())
    }
}

/// Control-signal state machine owning the BOOT and RESET outputs.
///
/// [`on_signal_change`](Self::on_signal_change) is synchronous and bounded so
/// it can run in the USB control-line notification context. The deferred
/// state is applied by [`run_debounce_timer`](Self::run_debounce_timer),
/// which must be running in its own task.
///
/// At most one deferred state is pending. Every new sample replaces or
/// cancels it, and cancelling when nothing is pending does nothing.
pub struct ControlLines<M: RawMutex, B, R> {
    lines: Mutex<M, RefCell<Lines<B, R>>>,
    rearm: Signal<M, ()>,
    debounce: Duration,
}

impl<M: RawMutex, B: OutputPin, R: OutputPin> ControlLines<M, B, R> {
    /// Take ownership of the pins and drive both lines high.
    pub fn new(boot: B, reset: R, debounce: Duration) -> Result<Self, BridgeError> {
        let mut lines = Lines {
            boot,
            reset,
            driven: TargetLines::RELEASED,
            pending: None,
        };
        lines.drive(TargetLines::RELEASED)?;

        Ok(Self {
            lines: Mutex::new(RefCell::new(lines)),
            rearm: Signal::new(),
            debounce,
        })
    }

    /// Handle a new DTR/RTS sample from the host.
    pub fn on_signal_change(&self, dtr: bool, rts: bool) {
        let transition = decode(dtr, rts);
        self.lines.lock(|lines| {
            let mut lines = lines.borrow_mut();
            match transition {
                Transition::Apply(target) => {
                    lines.pending = None;
                    info!(
                        "DTR = {}, RTS = {} -> BOOT = {}, RST = {}",
                        dtr,
                        rts,
                        target.boot,
                        target.reset
                    );
                    if lines.drive(target).is_err() {
                        warn!("Failed to drive BOOT/RST lines");
                    }
                }
                Transition::Defer(target) => {
                    lines.pending = Some((Instant::now() + self.debounce, target));
                }
            }
        });
        self.rearm.signal(());
    }

    /// Apply the deferred state if its deadline is at or before `now`.
    ///
    /// Returns `true` if the lines were driven.
    pub fn expire(&self, now: Instant) -> bool {
        self.lines.lock(|lines| {
            let mut lines = lines.borrow_mut();
            match lines.pending {
                Some((deadline, target)) if deadline <= now => {
                    lines.pending = None;
                    info!("BOOT = {}, RST = {}", target.boot, target.reset);
                    if lines.drive(target).is_err() {
                        warn!("Failed to drive BOOT/RST lines");
                    }
                    true
                }
                _ => false,
            }
        })
    }

    /// Deadline of the deferred state, if one is pending.
    #[must_use]
    pub fn pending_deadline(&self) -> Option<Instant> {
        self.lines
            .lock(|lines| lines.borrow().pending.map(|(deadline, _)| deadline))
    }

    /// Levels currently driven on the pins.
    #[must_use]
    pub fn driven(&self) -> TargetLines {
        self.lines.lock(|lines| lines.borrow().driven)
    }

    /// Debounce timer service. Never returns.
    ///
    /// Sleeps until the pending deadline and is woken early whenever a new
    /// sample re-arms or cancels it.
    pub async fn run_debounce_timer(&self) -> ! {
        loop {
            match self.pending_deadline() {
                None => self.rearm.wait().await,
                Some(deadline) => {
                    if let Either::First(()) =
                        select(Timer::at(deadline), self.rearm.wait()).await
                    {
                        self.expire(Instant::now());
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::convert::Infallible;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use embedded_hal::digital::ErrorType;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::vec::Vec;

    /// Output pin that records every level it was set to.
    #[derive(Clone, Default)]
    struct MockPin {
        levels: Arc<StdMutex<Vec<bool>>>,
    }

    impl MockPin {
        fn level(&self) -> Option<bool> {
            self.levels.lock().unwrap().last().copied()
        }

        fn writes(&self) -> usize {
            self.levels.lock().unwrap().len()
        }
    }

    impl ErrorType for MockPin {
        type Error = Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.levels.lock().unwrap().push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.levels.lock().unwrap().push(true);
            Ok(())
        }
    }

    /// Output pin that always fails.
    struct BrokenPin;

    impl ErrorType for BrokenPin {
        type Error = embedded_hal::digital::ErrorKind;
    }

    impl OutputPin for BrokenPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(embedded_hal::digital::ErrorKind::Other)
        }
    }

    type Machine = ControlLines<NoopRawMutex, MockPin, MockPin>;

    fn machine() -> (Machine, MockPin, MockPin) {
        let boot = MockPin::default();
        let reset = MockPin::default();
        let machine =
            Machine::new(boot.clone(), reset.clone(), Duration::from_millis(10)).unwrap();
        (machine, boot, reset)
    }

    fn pins(boot: &MockPin, reset: &MockPin) -> (Option<bool>, Option<bool>) {
        (boot.level(), reset.level())
    }

    #[test]
    fn test_decode_table() {
        assert_eq!(decode(false, false), Transition::Apply(TargetLines::RELEASED));
        assert_eq!(decode(false, true), Transition::Apply(TargetLines::RESET));
        assert_eq!(decode(true, false), Transition::Apply(TargetLines::BOOTLOADER));
        assert_eq!(decode(true, true), Transition::Defer(TargetLines::RELEASED));
    }

    #[test]
    fn test_both_lines_released_at_startup() {
        let (machine, boot, reset) = machine();
        assert_eq!(pins(&boot, &reset), (Some(true), Some(true)));
        assert_eq!(machine.driven(), TargetLines::RELEASED);
        assert_eq!(machine.pending_deadline(), None);
    }

    #[test]
    fn test_startup_fails_on_gpio_error() {
        let result = ControlLines::<NoopRawMutex, _, _>::new(
            BrokenPin,
            MockPin::default(),
            Duration::from_millis(10),
        );
        assert!(matches!(result, Err(BridgeError::Gpio)));
    }

    #[test]
    fn test_reset_applies_immediately() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(false, true);
        assert_eq!(pins(&boot, &reset), (Some(true), Some(false)));
        assert_eq!(machine.pending_deadline(), None);
    }

    #[test]
    fn test_both_asserted_is_deferred() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(false, true);
        machine.on_signal_change(true, true);

        let deadline = machine.pending_deadline().unwrap();
        assert!(!machine.expire(deadline - Duration::from_millis(5)));
        assert!(!machine.expire(deadline - Duration::from_micros(1)));
        assert_eq!(pins(&boot, &reset), (Some(true), Some(false)));

        assert!(machine.expire(deadline));
        assert_eq!(pins(&boot, &reset), (Some(true), Some(true)));
        assert_eq!(machine.pending_deadline(), None);
    }

    #[test]
    fn test_bootloader_sequence_cancels_pending_release() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(false, true);
        machine.on_signal_change(true, true);
        let deadline = machine.pending_deadline().unwrap();

        // DTR=1/RTS=0 arrives halfway through the debounce interval.
        assert!(!machine.expire(deadline - Duration::from_millis(5)));
        machine.on_signal_change(true, false);
        assert_eq!(pins(&boot, &reset), (Some(false), Some(true)));

        // The cancelled deadline never fires.
        assert!(!machine.expire(deadline));
        assert!(!machine.expire(deadline + Duration::from_secs(1)));
        assert_eq!(pins(&boot, &reset), (Some(false), Some(true)));
    }

    #[test]
    fn test_rearm_moves_deadline() {
        let (machine, _boot, _reset) = machine();
        machine.on_signal_change(true, true);
        let first = machine.pending_deadline().unwrap();
        machine.on_signal_change(true, true);
        let second = machine.pending_deadline().unwrap();
        assert!(second >= first);
    }

    #[test]
    fn test_repeated_sample_is_idempotent() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(true, false);
        let once = (pins(&boot, &reset), machine.pending_deadline());
        machine.on_signal_change(true, false);
        let twice = (pins(&boot, &reset), machine.pending_deadline());

        assert_eq!(once, twice);
        assert_eq!(once.0, (Some(false), Some(true)));
    }

    #[test]
    fn test_cancel_when_nothing_pending_is_noop() {
        let (machine, boot, reset) = machine();
        let writes = boot.writes();
        assert!(!machine.expire(Instant::now() + Duration::from_secs(1)));
        assert_eq!(boot.writes(), writes);
        assert_eq!(pins(&boot, &reset), (Some(true), Some(true)));
    }

    #[test]
    fn test_timer_service_applies_deferred_state() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(false, true);
        machine.on_signal_change(true, true);

        let observe = async {
            Timer::after(Duration::from_millis(30)).await;
        };
        block_on(select(machine.run_debounce_timer(), observe));

        assert_eq!(pins(&boot, &reset), (Some(true), Some(true)));
        assert_eq!(machine.pending_deadline(), None);
    }

    #[test]
    fn test_timer_service_respects_cancellation() {
        let (machine, boot, reset) = machine();
        machine.on_signal_change(false, true);

        let host = async {
            machine.on_signal_change(true, true);
            Timer::after(Duration::from_millis(5)).await;
            machine.on_signal_change(true, false);
            Timer::after(Duration::from_millis(30)).await;
        };
        block_on(select(machine.run_debounce_timer(), host));

        assert_eq!(pins(&boot, &reset), (Some(false), Some(true)));
    }
}
