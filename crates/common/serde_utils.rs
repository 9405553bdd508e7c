//! Serde adapters for the JSON shapes used by Ethereum tooling.

pub mod bytes {
    use ::bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        let value = value.strip_prefix("0x").unwrap_or(&value);
        hex::decode(value)
            .map(Bytes::from)
            .map_err(|e| D::Error::custom(e.to_string()))
    }
}

pub mod u256 {
    /// Decimal string, the format multisig transaction builders expect for `value`.
    pub mod dec_str {
        use ethereum_types::U256;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&value.to_string())
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(deserializer)?;
            match value.strip_prefix("0x") {
                Some(hex) => {
                    U256::from_str_radix(hex, 16).map_err(|e| D::Error::custom(e.to_string()))
                }
                None => U256::from_dec_str(&value).map_err(|e| D::Error::custom(e.to_string())),
            }
        }
    }

    pub mod hex_str {
        use ethereum_types::U256;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S>(value: &U256, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(deserializer)?;
            U256::from_str_radix(value.trim_start_matches("0x"), 16)
                .map_err(|e| D::Error::custom(e.to_string()))
        }
    }
}

pub mod u64 {
    pub mod hex_str {
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.serialize_str(&format!("{value:#x}"))
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
        where
            D: Deserializer<'de>,
        {
            let value = String::deserialize(deserializer)?;
            u64::from_str_radix(value.trim_start_matches("0x"), 16)
                .map_err(|e| D::Error::custom(e.to_string()))
        }
    }

    pub mod hex_str_opt {
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S>(value: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(value) => serializer.serialize_str(&format!("{value:#x}")),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Option::<String>::deserialize(deserializer)?
                .map(|value| {
                    u64::from_str_radix(value.trim_start_matches("0x"), 16)
                        .map_err(|e| D::Error::custom(e.to_string()))
                })
                .transpose()
        }
    }
}
