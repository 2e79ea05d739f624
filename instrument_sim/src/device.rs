//! In-memory model of an ADC instrument.
//!
//! Each channel `i` has a primary spectrum `chany{i}` and a companion time
//! axis `chanx{i}`. Even-numbered primaries are marked for saving, odd ones
//! are not. Waveforms are derived from the shot id so readers can tell which
//! shot a value belongs to.

use std::time::Instant;

use chrono::Utc;

use adcproxy_common::{
    AttributeReading, AttributeValue, InfoMap, PropertyMap, PropertySet, Quality,
    routes::{DEFAULT_ELAPSED_ATTRIBUTE, DEFAULT_SHOT_ATTRIBUTE},
};

/// Shape of the simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceOptions {
    /// Number of primary/companion channel pairs.
    pub channels: u32,
    /// Samples per spectrum.
    pub samples: u32,
    /// Average block size declared on enabled primaries.
    pub average: u32,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            channels: 4,
            samples: 64,
            average: 2,
        }
    }
}

pub struct SimulatedDevice {
    options: DeviceOptions,
    shot_id: u32,
    shot_started: Instant,
    properties: PropertyMap,
    failing: bool,
}

fn property(values: &[(&str, &str)]) -> PropertySet {
    values
        .iter()
        .map(|&(key, value)| (key.to_string(), vec![value.to_string()]))
        .collect()
}

/// Primary sample `k` of channel `channel` during shot `shot_id`.
#[must_use]
pub fn primary_sample(shot_id: u32, channel: u32, k: u32) -> f64 {
    f64::from(shot_id) * 1000.0 + f64::from(channel) * 100.0 + f64::from(k)
}

impl SimulatedDevice {
    #[must_use]
    pub fn new(options: DeviceOptions) -> Self {
        let mut properties = PropertyMap::new();
        let average = options.average.to_string();
        for channel in 0..options.channels {
            let enabled = channel % 2 == 0;
            let signal_label = format!("Signal {channel}");
            let time_label = format!("Time {channel}");
            properties.insert(
                format!("chany{channel}"),
                property(&[
                    ("save_data", if enabled { "true" } else { "false" }),
                    ("save_log", if enabled { "no" } else { "off" }),
                    ("save_avg", average.as_str()),
                    ("label", signal_label.as_str()),
                ]),
            );
            properties.insert(
                format!("chanx{channel}"),
                property(&[("label", time_label.as_str()), ("unit", "ms")]),
            );
        }
        Self {
            options,
            shot_id: 1,
            shot_started: Instant::now(),
            properties,
            failing: false,
        }
    }

    #[must_use]
    pub const fn shot_id(&self) -> u32 {
        self.shot_id
    }

    /// Seconds since the current acquisition started.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.shot_started.elapsed().as_secs_f64()
    }

    /// Complete a shot: new shot id, new waveforms, elapsed starts over.
    pub fn fire_shot(&mut self) -> u32 {
        self.shot_id = self.shot_id.wrapping_add(1);
        self.shot_started = Instant::now();
        self.shot_id
    }

    /// Start an acquisition without finishing it; only elapsed starts over.
    pub fn arm(&mut self) {
        self.shot_started = Instant::now();
    }

    #[must_use]
    pub const fn is_failing(&self) -> bool {
        self.failing
    }

    /// Flip failure injection; returns the new state.
    pub const fn toggle_failure(&mut self) -> bool {
        self.failing = !self.failing;
        self.failing
    }

    /// Every attribute name, channels in index order.
    #[must_use]
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = vec![
            DEFAULT_SHOT_ATTRIBUTE.to_string(),
            DEFAULT_ELAPSED_ATTRIBUTE.to_string(),
        ];
        for channel in 0..self.options.channels {
            names.push(format!("chany{channel}"));
            names.push(format!("chanx{channel}"));
        }
        names
    }

    /// Properties of the requested attributes; unknown names are skipped.
    #[must_use]
    pub fn properties(&self, names: &[String]) -> PropertyMap {
        names
            .iter()
            .filter(|name| self.has_attribute(name))
            .map(|name| {
                let set = self.properties.get(name).cloned().unwrap_or_default();
                (name.clone(), set)
            })
            .collect()
    }

    /// Info blobs of the requested attributes; unknown names are skipped.
    #[must_use]
    pub fn info(&self, names: &[String]) -> InfoMap {
        names
            .iter()
            .filter(|name| self.has_attribute(name))
            .map(|name| {
                let label = self
                    .properties
                    .get(name)
                    .and_then(|set| set.get("label"))
                    .and_then(|values| values.first())
                    .map_or_else(|| name.clone(), Clone::clone);
                let info = serde_json::json!({
                    "name": name,
                    "label": label,
                    "max_dim_x": self.options.samples,
                    "format": "%6.3f",
                });
                (name.clone(), info)
            })
            .collect()
    }

    fn channel_of<'name>(&self, name: &'name str) -> Option<(&'name str, u32)> {
        let (prefix, index) = name.split_at_checked(5)?;
        let index: u32 = index.parse().ok()?;
        (matches!(prefix, "chany" | "chanx") && index < self.options.channels)
            .then_some((prefix, index))
    }

    fn has_attribute(&self, name: &str) -> bool {
        name == DEFAULT_SHOT_ATTRIBUTE
            || name == DEFAULT_ELAPSED_ATTRIBUTE
            || self.channel_of(name).is_some()
    }

    /// Current value of one attribute, `None` if it does not exist.
    #[must_use]
    pub fn read(&self, name: &str) -> Option<AttributeReading> {
        let value = match name {
            DEFAULT_SHOT_ATTRIBUTE => AttributeValue::Scalar(f64::from(self.shot_id)),
            DEFAULT_ELAPSED_ATTRIBUTE => AttributeValue::Scalar(self.elapsed()),
            _ => {
                let (prefix, channel) = self.channel_of(name)?;
                let samples = (0..self.options.samples).map(|k| {
                    if prefix == "chany" {
                        primary_sample(self.shot_id, channel, k)
                    } else {
                        f64::from(k)
                    }
                });
                AttributeValue::Spectrum(samples.collect())
            }
        };
        Some(AttributeReading {
            value,
            quality: Quality::Valid,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use core::time::Duration;
    use std::thread;

    use super::*;

    fn device() -> SimulatedDevice {
        SimulatedDevice::new(DeviceOptions {
            channels: 3,
            samples: 4,
            average: 2,
        })
    }

    #[test]
    fn lists_scalars_and_channel_pairs() {
        assert_eq!(
            device().attribute_names(),
            vec!["Shot_id", "Elapsed", "chany0", "chanx0", "chany1", "chanx1", "chany2", "chanx2"]
        );
    }

    #[test]
    fn fire_shot_changes_id_and_waveforms() {
        let mut device = device();
        let before = device.read("chany1").unwrap();
        let shot = device.fire_shot();
        assert_eq!(shot, 2);
        assert_eq!(device.read("Shot_id").unwrap().value.as_scalar(), Some(2.0));
        let after = device.read("chany1").unwrap();
        assert_ne!(before.value, after.value);
        assert_eq!(
            after.value.into_samples(),
            vec![2100.0, 2101.0, 2102.0, 2103.0]
        );
        assert_eq!(
            device.read("chanx1").unwrap().value.into_samples(),
            vec![0.0, 1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn elapsed_starts_over_on_arm() {
        let mut device = device();
        thread::sleep(Duration::from_millis(20));
        let before = device.elapsed();
        device.arm();
        assert!(device.elapsed() < before, "elapsed did not restart");
        assert_eq!(device.shot_id(), 1);
    }

    #[test]
    fn even_primaries_are_enabled() {
        let device = device();
        let props = device.properties(&["chany0".into(), "chany1".into(), "bogus".into()]);
        assert_eq!(props.len(), 2);
        assert_eq!(props["chany0"]["save_data"], vec!["true".to_string()]);
        assert_eq!(props["chany1"]["save_data"], vec!["false".to_string()]);
        assert_eq!(props["chany1"]["save_avg"], vec!["2".to_string()]);
    }

    #[test]
    fn unknown_attributes_are_absent() {
        let device = device();
        assert!(device.read("chany3").is_none(), "out of range channel");
        assert!(device.read("chanz0").is_none(), "unknown prefix");
        assert!(device.read("x").is_none(), "short name");
        assert!(device.info(&["nope".into()]).is_empty());
        assert_eq!(device.info(&["chanx2".into()])["chanx2"]["label"], "Time 2");
    }

    #[test]
    fn failure_injection_toggles() {
        let mut device = device();
        assert!(!device.is_failing());
        assert!(device.toggle_failure());
        assert!(!device.toggle_failure());
    }
}
