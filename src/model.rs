// Model of the data exchanged with the heat pump

use core::fmt;

/// Declares an enum whose variants map to a CN105 byte and a display name.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = ($byte:literal, $label:literal)),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn byte(self) -> u8 {
                match self {
                    $($name::$variant => $byte),+
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.name() == name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

wire_enum!(Power {
    Off = (0x00, "OFF"),
    On = (0x01, "ON"),
});

wire_enum!(Mode {
    Heat = (0x01, "HEAT"),
    Dry = (0x02, "DRY"),
    Cool = (0x03, "COOL"),
    Fan = (0x07, "FAN"),
    Auto = (0x08, "AUTO"),
});

wire_enum!(FanSpeed {
    Auto = (0x00, "AUTO"),
    Quiet = (0x01, "QUIET"),
    Speed1 = (0x02, "1"),
    Speed2 = (0x03, "2"),
    Speed3 = (0x05, "3"),
    Speed4 = (0x06, "4"),
});

wire_enum!(
    /// Vertical airflow
    Vane {
        Auto = (0x00, "AUTO"),
        Position1 = (0x01, "1"),
        Position2 = (0x02, "2"),
        Position3 = (0x03, "3"),
        Position4 = (0x04, "4"),
        Position5 = (0x05, "5"),
        Swing = (0x07, "SWING"),
    }
);

wire_enum!(
    /// Horizontal airflow
    WideVane {
        FarLeft = (0x01, "<<"),
        Left = (0x02, "<"),
        Center = (0x03, "|"),
        Right = (0x04, ">"),
        FarRight = (0x05, ">>"),
        Split = (0x08, "<>"),
        Swing = (0x0c, "SWING"),
    }
);

wire_enum!(TimerMode {
    None = (0x00, "NONE"),
    Off = (0x01, "OFF"),
    On = (0x02, "ON"),
    Both = (0x03, "BOTH"),
});

pub const MIN_TEMPERATURE: f32 = 10.0;
pub const MAX_TEMPERATURE: f32 = 31.0;

/// Clamp a set-point to the supported range and snap it to half degrees.
pub fn normalize_temperature(celsius: f32) -> f32 {
    if celsius.is_nan() {
        return MIN_TEMPERATURE;
    }
    let clamped = celsius.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
    // Values are positive here, so truncation after +0.5 rounds to nearest
    let halves = (clamped * 2.0 + 0.5) as u32;
    halves as f32 / 2.0
}

/// Settings as reported by (or requested from) the unit.
///
/// `None` means the value has not been reported yet, or is not part of a
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeatPumpSettings {
    pub power: Option<Power>,
    pub mode: Option<Mode>,
    pub temperature: Option<f32>,
    pub fan: Option<FanSpeed>,
    pub vane: Option<Vane>,
    pub wide_vane: Option<WideVane>,
    pub i_see: bool,
}

impl HeatPumpSettings {
    /// Copy every field that is set in `other` over this one.
    pub fn merge(&mut self, other: &HeatPumpSettings) {
        if other.power.is_some() {
            self.power = other.power;
        }
        if other.mode.is_some() {
            self.mode = other.mode;
        }
        if other.temperature.is_some() {
            self.temperature = other.temperature;
        }
        if other.fan.is_some() {
            self.fan = other.fan;
        }
        if other.vane.is_some() {
            self.vane = other.vane;
        }
        if other.wide_vane.is_some() {
            self.wide_vane = other.wide_vane;
        }
    }

    /// Fields set here whose value differs from `current`.
    pub fn changes_from(&self, current: &HeatPumpSettings) -> HeatPumpSettings {
        fn pick<T: PartialEq + Copy>(wanted: Option<T>, current: Option<T>) -> Option<T> {
            match wanted {
                Some(w) if current != Some(w) => Some(w),
                _ => None,
            }
        }

        HeatPumpSettings {
            power: pick(self.power, current.power),
            mode: pick(self.mode, current.mode),
            temperature: pick(self.temperature, current.temperature),
            fan: pick(self.fan, current.fan),
            vane: pick(self.vane, current.vane),
            wide_vane: pick(self.wide_vane, current.wide_vane),
            i_see: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_none()
            && self.mode.is_none()
            && self.temperature.is_none()
            && self.fan.is_none()
            && self.vane.is_none()
            && self.wide_vane.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeatPumpTimers {
    pub mode: Option<TimerMode>,
    pub on_minutes_set: u16,
    pub on_minutes_remaining: u16,
    pub off_minutes_set: u16,
    pub off_minutes_remaining: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeatPumpStatus {
    pub room_temperature: Option<f32>,
    pub operating: bool,
    pub compressor_frequency: u8,
    pub timers: HeatPumpTimers,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_bytes_match_the_unit() {
        assert_eq!(Mode::from_name("COOL"), Some(Mode::Cool));
        assert_eq!(Mode::Cool.byte(), 0x03);
        assert_eq!(FanSpeed::from_byte(0x05), Some(FanSpeed::Speed3));
        assert_eq!(FanSpeed::Speed3.name(), "3");
        assert_eq!(WideVane::from_name("|"), Some(WideVane::Center));
        assert_eq!(WideVane::Swing.byte(), 0x0c);
        assert_eq!(Vane::from_byte(0x06), None);
        assert_eq!(Power::from_name("on"), None);
    }

    #[test]
    fn temperature_is_clamped_and_snapped() {
        assert_eq!(normalize_temperature(22.0), 22.0);
        assert_eq!(normalize_temperature(22.3), 22.5);
        assert_eq!(normalize_temperature(22.2), 22.0);
        assert_eq!(normalize_temperature(4.0), 10.0);
        assert_eq!(normalize_temperature(40.0), 31.0);
        assert_eq!(normalize_temperature(f32::NAN), 10.0);
        assert_eq!(normalize_temperature(f32::INFINITY), 31.0);
        assert_eq!(normalize_temperature(f32::NEG_INFINITY), 10.0);
    }

    #[test]
    fn changes_only_include_differing_fields() {
        let current = HeatPumpSettings {
            power: Some(Power::On),
            mode: Some(Mode::Cool),
            temperature: Some(24.0),
            ..Default::default()
        };
        let wanted = HeatPumpSettings {
            power: Some(Power::On),
            mode: Some(Mode::Heat),
            fan: Some(FanSpeed::Auto),
            ..Default::default()
        };

        let changes = wanted.changes_from(&current);
        assert_eq!(changes.power, None);
        assert_eq!(changes.mode, Some(Mode::Heat));
        assert_eq!(changes.temperature, None);
        assert_eq!(changes.fan, Some(FanSpeed::Auto));
        assert!(!changes.is_empty());
        assert!(current.changes_from(&current).is_empty());
    }

    #[test]
    fn merge_keeps_unset_fields() {
        let mut current = HeatPumpSettings {
            power: Some(Power::Off),
            vane: Some(Vane::Swing),
            ..Default::default()
        };
        current.merge(&HeatPumpSettings {
            power: Some(Power::On),
            ..Default::default()
        });
        assert_eq!(current.power, Some(Power::On));
        assert_eq!(current.vane, Some(Vane::Swing));
    }
}
