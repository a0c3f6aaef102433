use crate::domain::{
    AddressRecord, DeviceRecord, Digest, DomainResult, ObservationDigests, UserRecord,
};
use crate::garde::first_violation;
use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};

/// Order in which fields are checked; the first too-long one is reported
pub const FIELD_ORDER: [&str; 7] = [
    "username",
    "full_name",
    "serial",
    "client_identifier",
    "hostname",
    "ip",
    "internet_ip",
];

/// One submitted user/device/address sighting.
///
/// Length limits are byte counts and mirror the column widths of the schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct Observation {
    #[serde(default)]
    #[garde(skip)]
    pub uid: u32,

    #[garde(length(max = 64))]
    pub username: String,

    #[garde(length(max = 128))]
    pub full_name: String,

    #[garde(length(max = 32))]
    pub serial: String,

    #[serde(default)]
    #[garde(length(max = 64))]
    pub client_identifier: String,

    #[serde(default)]
    #[garde(length(max = 32))]
    pub hostname: String,

    #[garde(length(max = 15))]
    pub ip: String,

    #[serde(default)]
    #[garde(length(max = 15))]
    pub internet_ip: String,

    #[serde(default = "Utc::now")]
    #[garde(skip)]
    pub time: DateTime<Utc>,
}

impl Observation {
    /// Checks every field against its limit, failing on the first one that is too long
    pub fn check(&self) -> DomainResult<()> {
        self.validate().map_err(|report| first_violation(&report, &FIELD_ORDER))
    }

    /// Derives the user, device, address and identity digests
    pub fn digests(&self) -> ObservationDigests {
        let uid = self.uid.to_string();
        ObservationDigests::new(
            Digest::of(&[uid.as_str(), self.username.as_str(), self.full_name.as_str()]),
            Digest::of(&[
                self.serial.as_str(),
                self.client_identifier.as_str(),
                self.hostname.as_str(),
            ]),
            Digest::of(&[self.ip.as_str(), self.internet_ip.as_str()]),
        )
    }

    pub fn user_record(&self) -> UserRecord {
        UserRecord {
            uid: self.uid,
            username: self.username.clone(),
            full_name: self.full_name.clone(),
        }
    }

    pub fn device_record(&self) -> DeviceRecord {
        DeviceRecord {
            serial: self.serial.clone(),
            client_identifier: self.client_identifier.clone(),
            hostname: self.hostname.clone(),
        }
    }

    pub fn address_record(&self) -> AddressRecord {
        AddressRecord {
            ip: self.ip.clone(),
            internet_ip: self.internet_ip.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainError;

    fn observation() -> Observation {
        Observation {
            uid: 1,
            username: "alice".to_string(),
            full_name: "Alice A".to_string(),
            serial: "SN1".to_string(),
            client_identifier: String::new(),
            hostname: String::new(),
            ip: "10.0.0.1".to_string(),
            internet_ip: "8.8.8.8".to_string(),
            time: Utc::now(),
        }
    }

    fn rejected_field(obs: &Observation) -> String {
        match obs.check() {
            Err(DomainError::FieldTooLong(field)) => field,
            other => panic!("expected FieldTooLong, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_observation_passes() {
        assert!(observation().check().is_ok());
    }

    #[test]
    fn test_fields_at_limit_pass() {
        let mut obs = observation();
        obs.username = "u".repeat(64);
        obs.full_name = "f".repeat(128);
        obs.serial = "s".repeat(32);
        obs.client_identifier = "c".repeat(64);
        obs.hostname = "h".repeat(32);
        obs.ip = "1".repeat(15);
        obs.internet_ip = "2".repeat(15);
        assert!(obs.check().is_ok());
    }

    #[test]
    fn test_one_byte_over_names_field() {
        let cases: Vec<(&str, Box<dyn Fn(&mut Observation)>)> = vec![
            ("username", Box::new(|o| o.username = "u".repeat(65))),
            ("full_name", Box::new(|o| o.full_name = "f".repeat(129))),
            ("serial", Box::new(|o| o.serial = "s".repeat(33))),
            ("client_identifier", Box::new(|o| o.client_identifier = "c".repeat(65))),
            ("hostname", Box::new(|o| o.hostname = "h".repeat(33))),
            ("ip", Box::new(|o| o.ip = "1".repeat(16))),
            ("internet_ip", Box::new(|o| o.internet_ip = "2".repeat(16))),
        ];

        for (field, mutate) in cases {
            let mut obs = observation();
            mutate(&mut obs);
            assert_eq!(rejected_field(&obs), field);
        }
    }

    #[test]
    fn test_limits_count_bytes_not_chars() {
        let mut obs = observation();
        // 11 chars, 22 bytes
        obs.hostname = "é".repeat(11);
        assert!(obs.check().is_ok());
        obs.hostname = "é".repeat(17);
        assert_eq!(rejected_field(&obs), "hostname");
    }

    #[test]
    fn test_first_violation_wins() {
        let mut obs = observation();
        obs.serial = "s".repeat(40);
        obs.ip = "1".repeat(40);
        assert_eq!(rejected_field(&obs), "serial");
    }

    #[test]
    fn test_username_reported_before_full_name() {
        let mut obs = observation();
        obs.username = "u".repeat(65);
        obs.full_name = "f".repeat(129);
        assert_eq!(rejected_field(&obs), "username");
    }

    #[test]
    fn test_violations_reported_in_field_order() {
        // Every field too long, then each leading one fixed in turn
        let mut obs = observation();
        obs.username = "u".repeat(65);
        obs.full_name = "f".repeat(129);
        obs.serial = "s".repeat(33);
        obs.client_identifier = "c".repeat(65);
        obs.hostname = "h".repeat(33);
        obs.ip = "1".repeat(16);
        obs.internet_ip = "2".repeat(16);

        let fixes: [fn(&mut Observation); 6] = [
            |o| o.username.clear(),
            |o| o.full_name.clear(),
            |o| o.serial.clear(),
            |o| o.client_identifier.clear(),
            |o| o.hostname.clear(),
            |o| o.ip.clear(),
        ];
        for (expected, fix) in FIELD_ORDER.iter().zip(fixes) {
            assert_eq!(rejected_field(&obs), *expected);
            fix(&mut obs);
        }
        assert_eq!(rejected_field(&obs), "internet_ip");
    }

    #[test]
    fn test_error_message_names_field() {
        let mut obs = observation();
        obs.username = "u".repeat(100);
        let err = obs.check().unwrap_err();
        assert_eq!(err.to_string(), "Field username is too long");
    }

    #[test]
    fn test_digests_follow_field_groups() {
        let obs = observation();
        let digests = obs.digests();
        assert_eq!(digests.user, Digest::of(&["1", "alice", "Alice A"]));
        assert_eq!(digests.device, Digest::of(&["SN1", "", ""]));
        assert_eq!(digests.address, Digest::of(&["10.0.0.1", "8.8.8.8"]));
    }

    #[test]
    fn test_digests_ignore_time() {
        let a = observation();
        let mut b = observation();
        b.time = a.time + chrono::Duration::hours(1);
        assert_eq!(a.digests(), b.digests());
    }

    #[test]
    fn test_deserialize_defaults_optional_fields() {
        let obs: Observation = serde_json::from_str(
            r#"{"username":"alice","full_name":"Alice A","serial":"SN1","ip":"10.0.0.1"}"#,
        )
        .unwrap();
        assert_eq!(obs.uid, 0);
        assert_eq!(obs.client_identifier, "");
        assert_eq!(obs.internet_ip, "");
    }
}
