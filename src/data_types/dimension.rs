use super::measurement::Measurement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Measured quantity. Declaration order is the order charts are offered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DimensionTag {
    Temperature,
    Humidity,
    Pressure,
    Co2,
    Pm1,
    Pm2_5,
    Pm4,
    Pm10,
    Voc,
    Nox,
    Luminance,
    SoundAvg,
    SoundPeak,
    Rssi,
    Voltage,
    Movement,
}

impl DimensionTag {
    pub const ALL: [DimensionTag; 16] = [
        Self::Temperature,
        Self::Humidity,
        Self::Pressure,
        Self::Co2,
        Self::Pm1,
        Self::Pm2_5,
        Self::Pm4,
        Self::Pm10,
        Self::Voc,
        Self::Nox,
        Self::Luminance,
        Self::SoundAvg,
        Self::SoundPeak,
        Self::Rssi,
        Self::Voltage,
        Self::Movement,
    ];

    /// Resolves the unit-conversion closure for this dimension once.
    pub fn projection(self, units: &UnitSettings) -> Projection {
        let convert: Converter = match self {
            Self::Temperature => {
                let unit = units.temperature;
                let offset = units.temperature_offset;
                Arc::new(move |m: &Measurement| {
                    m.value(Self::Temperature)
                        .map(|c| unit.from_celsius(c + offset))
                })
            }
            Self::Humidity => {
                let unit = units.humidity;
                let t_unit = units.temperature;
                let t_offset = units.temperature_offset;
                let h_offset = units.humidity_offset;
                Arc::new(move |m: &Measurement| {
                    let rh = m.value(Self::Humidity)? + h_offset;
                    match unit {
                        HumidityUnit::Relative => Some(rh),
                        HumidityUnit::Absolute => {
                            let t = m.value(Self::Temperature)? + t_offset;
                            Some(absolute_humidity(t, rh))
                        }
                        HumidityUnit::DewPoint => {
                            let t = m.value(Self::Temperature)? + t_offset;
                            Some(t_unit.from_celsius(dew_point(t, rh)))
                        }
                    }
                })
            }
            Self::Pressure => {
                let unit = units.pressure;
                let offset = units.pressure_offset;
                Arc::new(move |m: &Measurement| {
                    m.value(Self::Pressure).map(|pa| unit.from_pascal(pa + offset))
                })
            }
            other => Arc::new(move |m: &Measurement| m.value(other)),
        };
        Projection { tag: self, convert }
    }
}

impl fmt::Display for DimensionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Co2 => "co2",
            Self::Pm1 => "pm1",
            Self::Pm2_5 => "pm2.5",
            Self::Pm4 => "pm4",
            Self::Pm10 => "pm10",
            Self::Voc => "voc",
            Self::Nox => "nox",
            Self::Luminance => "luminance",
            Self::SoundAvg => "sound_avg",
            Self::SoundPeak => "sound_peak",
            Self::Rssi => "rssi",
            Self::Voltage => "voltage",
            Self::Movement => "movement",
        };
        f.write_str(name)
    }
}

pub type Converter = Arc<dyn Fn(&Measurement) -> Option<f64> + Send + Sync>;

/// A dimension bound to its display-unit conversion.
#[derive(Clone)]
pub struct Projection {
    pub tag: DimensionTag,
    convert: Converter,
}

impl Projection {
    /// Display value of `m`, `None` when the field is missing or not finite.
    pub fn value(&self, m: &Measurement) -> Option<f64> {
        (self.convert)(m).filter(|v| v.is_finite())
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection").field("tag", &self.tag).finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    pub fn from_celsius(self, c: f64) -> f64 {
        match self {
            Self::Celsius => c,
            Self::Fahrenheit => c * 9.0 / 5.0 + 32.0,
            Self::Kelvin => c + 273.15,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HumidityUnit {
    /// Relative humidity in percent.
    #[default]
    Relative,
    /// Grams of water vapour per cubic metre.
    Absolute,
    /// Dew point, expressed in the chart's temperature unit.
    DewPoint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureUnit {
    Pascal,
    #[default]
    Hectopascal,
    MillimetersOfMercury,
    InchesOfMercury,
}

impl PressureUnit {
    pub fn from_pascal(self, pa: f64) -> f64 {
        match self {
            Self::Pascal => pa,
            Self::Hectopascal => pa / 100.0,
            Self::MillimetersOfMercury => pa / 133.322_387_415,
            Self::InchesOfMercury => pa / 3_386.388_64,
        }
    }
}

/// Display units and calibration offsets. Offsets are in storage units
/// (°C, %RH, Pa) and are applied before conversion.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSettings {
    pub temperature: TemperatureUnit,
    pub humidity: HumidityUnit,
    pub pressure: PressureUnit,
    pub temperature_offset: f64,
    pub humidity_offset: f64,
    pub pressure_offset: f64,
}

// Magnus coefficients over water.
const MAGNUS_B: f64 = 17.62;
const MAGNUS_C: f64 = 243.12;

fn saturation_vapor_pressure_hpa(celsius: f64) -> f64 {
    6.112 * (MAGNUS_B * celsius / (MAGNUS_C + celsius)).exp()
}

/// Absolute humidity in g/m³.
pub fn absolute_humidity(celsius: f64, relative: f64) -> f64 {
    let vapor_hpa = saturation_vapor_pressure_hpa(celsius) * relative / 100.0;
    216.7 * vapor_hpa / (273.15 + celsius)
}

/// Dew point in °C. Zero relative humidity yields negative infinity.
pub fn dew_point(celsius: f64, relative: f64) -> f64 {
    let gamma = (relative / 100.0).ln() + MAGNUS_B * celsius / (MAGNUS_C + celsius);
    MAGNUS_C * gamma / (MAGNUS_B - gamma)
}
