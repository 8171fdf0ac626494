//! Human readable status lines

use core::fmt::{self, Write};

use heapless::String;

use crate::model::{HeatPumpSettings, HeatPumpStatus, HeatPumpTimers};
use crate::traits::Console;

const LINE_CAPACITY: usize = 96;

/// Format into a fixed buffer and print it as one line
pub fn print_fmt<K: Console>(console: &mut K, args: fmt::Arguments<'_>) {
    let mut line: String<LINE_CAPACITY> = String::new();
    let _ = line.write_fmt(args);
    console.print_line(line.as_str());
}

struct OrUnknown<T>(Option<T>);

impl<T: fmt::Display> fmt::Display for OrUnknown<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(value) => fmt::Display::fmt(value, f),
            None => f.write_str("UNKNOWN"),
        }
    }
}

struct Celsius(Option<f32>);

impl fmt::Display for Celsius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{:.1} °C", value),
            None => f.write_str("UNKNOWN"),
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

pub fn print_settings<K: Console>(console: &mut K, settings: &HeatPumpSettings) {
    console.print_line("Current heat pump settings:");
    print_fmt(console, format_args!("  Power: {}", OrUnknown(settings.power)));
    print_fmt(console, format_args!("  Mode: {}", OrUnknown(settings.mode)));
    print_fmt(
        console,
        format_args!("  Set temperature: {}", Celsius(settings.temperature)),
    );
    print_fmt(console, format_args!("  Fan speed: {}", OrUnknown(settings.fan)));
    print_fmt(
        console,
        format_args!("  Vane (vertical): {}", OrUnknown(settings.vane)),
    );
    print_fmt(
        console,
        format_args!("  Wide vane (horizontal): {}", OrUnknown(settings.wide_vane)),
    );
    print_fmt(
        console,
        format_args!("  iSee sensor detected: {}", yes_no(settings.i_see)),
    );
}

pub fn print_timers<K: Console>(console: &mut K, timers: &HeatPumpTimers) {
    print_fmt(console, format_args!("  Timer mode: {}", OrUnknown(timers.mode)));
    print_fmt(
        console,
        format_args!(
            "  On timer set/remain: {}/{} minutes",
            timers.on_minutes_set, timers.on_minutes_remaining
        ),
    );
    print_fmt(
        console,
        format_args!(
            "  Off timer set/remain: {}/{} minutes",
            timers.off_minutes_set, timers.off_minutes_remaining
        ),
    );
}

pub fn print_status<K: Console>(console: &mut K, status: &HeatPumpStatus) {
    console.print_line("Heat pump status:");
    print_fmt(
        console,
        format_args!("  Room temperature: {}", Celsius(status.room_temperature)),
    );
    print_fmt(
        console,
        format_args!("  Operating: {}", yes_no(status.operating)),
    );
    print_fmt(
        console,
        format_args!("  Compressor frequency: {}", status.compressor_frequency),
    );
    print_timers(console, &status.timers);
}

pub fn print_room_temperature<K: Console>(console: &mut K, celsius: f32) {
    print_fmt(
        console,
        format_args!("Room temperature changed: {}", Celsius(Some(celsius))),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingConsole;
    use crate::model::{FanSpeed, Mode, Power, TimerMode, Vane, WideVane};

    #[test]
    fn settings_block_matches_log_format() {
        let mut console = RecordingConsole::new();
        print_settings(
            &mut console,
            &HeatPumpSettings {
                power: Some(Power::On),
                mode: Some(Mode::Heat),
                temperature: Some(22.0),
                fan: Some(FanSpeed::Auto),
                vane: Some(Vane::Swing),
                wide_vane: Some(WideVane::Center),
                i_see: false,
            },
        );

        assert_eq!(
            console.lines,
            [
                "Current heat pump settings:",
                "  Power: ON",
                "  Mode: HEAT",
                "  Set temperature: 22.0 °C",
                "  Fan speed: AUTO",
                "  Vane (vertical): SWING",
                "  Wide vane (horizontal): |",
                "  iSee sensor detected: no",
            ]
        );
    }

    #[test]
    fn unknown_fields_print_as_unknown() {
        let mut console = RecordingConsole::new();
        print_settings(&mut console, &HeatPumpSettings::default());

        assert!(console.contains("  Power: UNKNOWN"));
        assert!(console.contains("  Set temperature: UNKNOWN"));
        assert!(console.contains("  Wide vane (horizontal): UNKNOWN"));
    }

    #[test]
    fn status_block_includes_timers() {
        let mut console = RecordingConsole::new();
        print_status(
            &mut console,
            &HeatPumpStatus {
                room_temperature: Some(21.5),
                operating: true,
                compressor_frequency: 38,
                timers: HeatPumpTimers {
                    mode: Some(TimerMode::On),
                    on_minutes_set: 120,
                    on_minutes_remaining: 90,
                    off_minutes_set: 0,
                    off_minutes_remaining: 0,
                },
            },
        );

        assert_eq!(
            console.lines,
            [
                "Heat pump status:",
                "  Room temperature: 21.5 °C",
                "  Operating: yes",
                "  Compressor frequency: 38",
                "  Timer mode: ON",
                "  On timer set/remain: 120/90 minutes",
                "  Off timer set/remain: 0/0 minutes",
            ]
        );
    }

    #[test]
    fn room_temperature_line() {
        let mut console = RecordingConsole::new();
        print_room_temperature(&mut console, 19.0);
        assert_eq!(console.lines, ["Room temperature changed: 19.0 °C"]);
    }
}
