#![no_std]
#![no_main]

mod board;

use panic_halt as _;
use defmt_rtt as _;

/*
RTIC firmware for the Pico build of the brew controller.
The control logic lives in the library, this file only owns the hardware.
*/

// Place unused IRQs in the dispatchers list.  You need one IRQ for each priority level in your code
#[rtic::app(device = rp_pico::hal::pac, peripherals = true, dispatchers = [ADC_IRQ_FIFO, UART1_IRQ])]
mod app {

    use embedded_hal::adc::OneShot;
    use fugit::MicrosDurationU64;
    use defmt::*;
    use rp_pico::{
        hal::{self, clocks::init_clocks_and_plls, timer::{monotonic::Monotonic, Alarm, Alarm0}, watchdog::Watchdog, Sio},
        XOSC_CRYSTAL_FREQ,
    };
    use rp_pico::hal::gpio::{DynPin, Pin, PushPullOutput, FloatingInput};
    use rp_pico::hal::gpio::pin::bank0::{Gpio12, Gpio13, Gpio14, Gpio26};

    use brew_controller::buttons::sample_buttons;
    use brew_controller::config::FlashStorage;
    use brew_controller::controller::Controller;
    use brew_controller::output::Actuators;
    use brew_controller::{DISPLAY_TICK, FAST_TICK, MENU_TICK};
    use crate::board::{LedPort, OnboardFlash, PumpPin, CONFIG_SECTOR, DIGITS};

    // RP2040 ADC is 12 bit, the temperature table expects 10 bit codes
    const ADC_SHIFT: u16 = 2;

    type Relays = Actuators<
        Pin<Gpio12, PushPullOutput>,    // heat
        Pin<Gpio13, PushPullOutput>,    // cool
        Pin<Gpio14, PushPullOutput>,    // buzzer
        PumpPin,
    >;

    // Alarm0 which generates interrupt request TIMER_IRQ_0 is used by monotonic
    #[monotonic(binds = TIMER_IRQ_0, default = true)]
    type MonotonicType = Monotonic<Alarm0>;

    // ----------------------------------------------------------------
    // -----  SHARED DATA
    // ----------------------------------------------------------------
    #[shared]
    struct Shared {
        alarm1: hal::timer::Alarm1,     // For fast tick
        alarm2: hal::timer::Alarm2,     // For display multiplexing

        // Configuration lives in the last flash sector
        controller: Controller<FlashStorage<OnboardFlash>>,

        // Segment and anode lines, also the button inputs
        leds: LedPort,

        // Raw bytes the multiplexer shows
        digits: [u8; DIGITS],
    }

    // ----------------------------------------------------------------
    // -----  LOCAL DATA
    // ----------------------------------------------------------------
    #[local]
    struct Local {
        relays: Relays,
        adc: hal::Adc,
        adc_pin: Pin<Gpio26, FloatingInput>,
    }

    // ----------------------------------------------------------------
    // -----  APP INIT
    // ----------------------------------------------------------------
    #[init]
    fn init(c: init::Context) -> (Shared, Local, init::Monotonics) {
        // --- Init boilerplate ---
        // Soft-reset does not release the hardware spinlocks
        // Release them now to avoid a deadlock after debug or watchdog reset
        unsafe {
            hal::sio::spinlock_reset();
        }
        let mut resets = c.device.RESETS;
        let mut watchdog = Watchdog::new(c.device.WATCHDOG);
        let _clocks = init_clocks_and_plls(
            XOSC_CRYSTAL_FREQ,
            c.device.XOSC,
            c.device.CLOCKS,
            c.device.PLL_SYS,
            c.device.PLL_USB,
            &mut resets,
            &mut watchdog,
        )
        .ok()
        .unwrap();

        let sio = Sio::new(c.device.SIO);
        let pins = rp_pico::Pins::new(
            c.device.IO_BANK0,
            c.device.PADS_BANK0,
            sio.gpio_bank0,
            &mut resets,
        );
        // --- End of init boilerplate ---

        // Create new timer.  Provides four alarm interrupts (0-3)
        let mut timer = hal::Timer::new(c.device.TIMER, &mut resets);

        // Alarm0 is dedicated to the rtic monotonic, it runs the menu task
        let alarm0 = timer.alarm_0().unwrap();

        // Alarm1 generates TIMER_IRQ_1, the fast tick
        let mut alarm1 = timer.alarm_1().unwrap();

        // Alarm2 generates TIMER_IRQ_2, the display multiplexer
        let mut alarm2 = timer.alarm_2().unwrap();

        // ----------- DISPLAY AND BUTTONS ------------
        let segments: [DynPin; 8] = [
            pins.gpio0.into_push_pull_output().into(),
            pins.gpio1.into_push_pull_output().into(),
            pins.gpio2.into_push_pull_output().into(),
            pins.gpio3.into_push_pull_output().into(),
            pins.gpio4.into_push_pull_output().into(),
            pins.gpio5.into_push_pull_output().into(),
            pins.gpio6.into_push_pull_output().into(),
            pins.gpio7.into_push_pull_output().into(),
        ];
        let anodes: [DynPin; DIGITS] = [
            pins.gpio8.into_push_pull_output().into(),
            pins.gpio9.into_push_pull_output().into(),
            pins.gpio10.into_push_pull_output().into(),
            pins.gpio11.into_push_pull_output().into(),
        ];
        let leds = LedPort::new(segments, anodes);

        // ----------- RELAYS, BUZZER, PUMP ------------
        let mut relays = Actuators::new(
            pins.gpio12.into_push_pull_output(),
            pins.gpio13.into_push_pull_output(),
            pins.gpio14.into_push_pull_output(),
            PumpPin::new(pins.gpio15.into()),
        );
        relays.all_off();

        // ----------- THERMISTOR ADC ------------
        let adc = hal::Adc::new(c.device.ADC, &mut resets);
        let adc_pin = pins.gpio26.into_floating_input();

        // ----------- CONFIGURATION ------------
        let controller = Controller::new(FlashStorage::new(OnboardFlash::new(), CONFIG_SECTOR));
        let digits = controller.frame().encode();

        info!("Brew controller started");

        // Schedule the fast tick HW interrupt task.
        let _ = alarm1.schedule(FAST_TICK);
        alarm1.enable_interrupt();

        // Schedule the display multiplex HW interrupt task.
        let _ = alarm2.schedule(DISPLAY_TICK);
        alarm2.enable_interrupt();

        // First menu tick, it re-spawns itself
        menu_task::spawn_after(MicrosDurationU64::micros(MENU_TICK.to_micros() as u64)).unwrap();

        let monotonic: MonotonicType = Monotonic::new(timer, alarm0);

        // Init and return the Shared data structure
        (Shared {
            alarm1,
            alarm2,
            controller,
            leds,
            digits,
            },
        Local {
            relays,
            adc,
            adc_pin,
            },
        init::Monotonics(monotonic)
        )
    }

    // ----------------------------------------------------------------
    // -- DISPLAY MULTIPLEX TASK
    // ----------------------------------------------------------------
    #[task(
        priority = 3,
        binds = TIMER_IRQ_2,
        shared = [alarm2, leds, digits],
    )]
    fn display_task (c: display_task::Context) {

        (c.shared.alarm2, c.shared.leds, c.shared.digits).lock(|a, leds, digits| {
            a.clear_interrupt();
            let _ = a.schedule(DISPLAY_TICK);
            leds.refresh(digits);
        });
    }

    // ----------------------------------------------------------------
    // -- FAST TICK TASK: ADC filter, relay duty cycle, once a second the brew program
    // ----------------------------------------------------------------
    #[task(
        priority = 2,
        binds = TIMER_IRQ_1,
        shared = [alarm1, controller, digits],
        local = [relays, adc, adc_pin, last_raw: u16 = 0],
    )]
    fn fast_tick_task (mut c: fast_tick_task::Context) {

        let mut alarm = c.shared.alarm1;
        (alarm).lock(|a|{
            a.clear_interrupt();
            let _ = a.schedule(FAST_TICK);
        });

        // Keep the previous code if a conversion fails
        let sample: Result<u16, _> = c.local.adc.read(c.local.adc_pin);
        if let Ok(raw) = sample {
            *c.local.last_raw = raw >> ADC_SHIFT;
        }
        let raw = *c.local.last_raw;

        let (signals, frame, report) = c.shared.controller.lock(|ctl| {
            let signals = ctl.fast_tick(raw);
            let report = if ctl.is_second_tick() {
                Some((ctl.status(), ctl.program_events().clone()))
            } else {
                None
            };
            (signals, ctl.frame().encode(), report)
        });

        c.local.relays.apply(&signals);
        c.shared.digits.lock(|d| *d = frame);

        if let Some((status, events)) = report {
            for event in events.iter() {
                info!("Program {}", event);
            }
            match status.to_json() {
                Ok(json) => info!("{}", json.as_str()),
                Err(_) => warn!("Status report does not fit"),
            }
        }
    }

    // ----------------------------------------------------------------
    // ------- MENU TASK
    // ----------------------------------------------------------------
    #[task(
        priority = 1,
        shared = [controller, leds, digits],
    )]
    fn menu_task (c: menu_task::Context) {

        // Holding the led port keeps the multiplexer off the shared lines
        let mut leds = c.shared.leds;
        let buttons = leds.lock(|l| sample_buttons(l));

        let (action, period) = (c.shared.controller, c.shared.digits).lock(|ctl, d| {
            let action = ctl.menu_tick(buttons);
            *d = ctl.frame().encode();
            (action, ctl.menu_period())
        });

        if let Some(action) = action {
            info!("Menu {}", action);
        }

        menu_task::spawn_after(MicrosDurationU64::micros(period.to_micros() as u64)).unwrap();
    }

}
