use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use super::fanout::fan_out;
use crate::device::{read_serial, SessionFactory};

/// Chassis serial of a live device, or `Unknown` when it could not be read
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Serial {
    Known(String),
    Unknown,
}

impl Serial {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Serial::Known(s) => Some(s),
            Serial::Unknown => None,
        }
    }
}

impl fmt::Display for Serial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Serial::Known(s) => f.write_str(s),
            Serial::Unknown => f.write_str("Unknown"),
        }
    }
}

/// Log in to every address and read its serial.
///
/// Returns exactly one entry per address. Any per-device failure becomes
/// `Serial::Unknown` for that address and never affects the others.
pub async fn collect_serials(
    factory: Arc<dyn SessionFactory>,
    addresses: &BTreeSet<String>,
    limit: usize,
) -> BTreeMap<String, Serial> {
    let results = fan_out(addresses.iter().cloned(), limit, |address| {
        let factory = factory.clone();
        async move {
            match read_serial(factory.as_ref(), &address).await {
                Ok(serial) => Serial::Known(serial),
                Err(e) => {
                    tracing::warn!("Could not read serial from {}: {}", address, e);
                    Serial::Unknown
                }
            }
        }
    })
    .await;

    results
        .into_iter()
        .map(|(address, serial)| (address, serial.unwrap_or(Serial::Unknown)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, FakeSessionFactory};
    use std::time::Duration;

    fn addresses(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|a| a.to_string()).collect()
    }

    #[tokio::test]
    async fn test_collect_serials_tolerates_failures() {
        let factory = FakeSessionFactory::new()
            .with_device("10.0.0.1", FakeDevice::new("S1"))
            .with_device("10.0.0.2", FakeDevice::new("S2").failing_facts())
            .with_device("10.0.0.3", FakeDevice::new("S3").failing_open());

        let serials = collect_serials(
            Arc::new(factory),
            &addresses(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"]),
            8,
        )
        .await;

        assert_eq!(serials.len(), 4);
        assert_eq!(serials["10.0.0.1"], Serial::Known("S1".to_string()));
        assert_eq!(serials["10.0.0.2"], Serial::Unknown);
        assert_eq!(serials["10.0.0.3"], Serial::Unknown);
        assert_eq!(serials["10.0.0.4"], Serial::Unknown);
    }

    #[tokio::test]
    async fn test_collect_serials_respects_session_limit() {
        let mut factory = FakeSessionFactory::new().with_open_delay(Duration::from_millis(10));
        let list: Vec<String> = (1..=10).map(|n| format!("10.0.0.{}", n)).collect();
        for (n, address) in list.iter().enumerate() {
            factory = factory.with_device(address, FakeDevice::new(&format!("S{}", n)));
        }
        let recorder = factory.clone();

        let serials = collect_serials(Arc::new(factory), &list.iter().cloned().collect(), 2).await;

        assert_eq!(serials.len(), 10);
        assert!(serials.values().all(|s| s.as_known().is_some()));
        assert!(recorder.peak_sessions() <= 2);
    }

    #[tokio::test]
    async fn test_collect_serials_empty() {
        let serials = collect_serials(Arc::new(FakeSessionFactory::new()), &BTreeSet::new(), 4).await;
        assert!(serials.is_empty());
    }

    #[test]
    fn test_serial_display() {
        assert_eq!(Serial::Known("FOC1".to_string()).to_string(), "FOC1");
        assert_eq!(Serial::Unknown.to_string(), "Unknown");
    }
}
