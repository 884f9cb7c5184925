use serde::{Deserialize, Serialize};

/// Wire model of the panel management API (`/api/v1`).
pub mod api {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Inbound {
        pub id: i64,
        #[serde(default)]
        pub remark: String,
        pub enabled: bool,
        pub port: u16,
        pub protocol: String,
        #[serde(default)]
        pub client_count: u32,
    }

    /// A client account as reported by `GET /api/v1/inbounds/{id}/stats`.
    ///
    /// `total_gb` and `expiry_time` use `0` for "unlimited".
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Client {
        pub id: i64,
        #[serde(default)]
        pub remark: String,
        #[serde(default, alias = "subscription_remark")]
        pub sub_remark: String,
        pub enabled: bool,
        #[serde(default)]
        pub total_gb: f64,
        #[serde(default)]
        pub used_traffic_bytes: u64,
        #[serde(default)]
        pub expiry_time: i64,
        #[serde(default)]
        pub online: bool,
        #[serde(default)]
        pub config_link_domain: Option<String>,
        #[serde(default)]
        pub config_link_ip: Option<String>,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Network {
        #[default]
        Tcp,
        Ws,
        Grpc,
    }

    impl std::str::FromStr for Network {
        type Err = String;

        fn from_str(s: &str) -> Result<Self, Self::Err> {
            match s.to_ascii_lowercase().as_str() {
                "tcp" => Ok(Network::Tcp),
                "ws" => Ok(Network::Ws),
                "grpc" => Ok(Network::Grpc),
                other => Err(format!("unknown network '{}'", other)),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct WsSettings {
        pub path: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct GrpcSettings {
        #[serde(rename = "serviceName")]
        pub service_name: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct StreamSettings {
        pub network: Network,
        pub security: String,
        #[serde(rename = "wsSettings", default, skip_serializing_if = "Option::is_none")]
        pub ws_settings: Option<WsSettings>,
        #[serde(rename = "grpcSettings", default, skip_serializing_if = "Option::is_none")]
        pub grpc_settings: Option<GrpcSettings>,
    }

    impl StreamSettings {
        /// Transport defaults the panel expects for a freshly created inbound.
        pub fn for_network(network: Network) -> Self {
            Self {
                network,
                security: "none".to_string(),
                ws_settings: (network == Network::Ws).then(|| WsSettings {
                    path: "/".to_string(),
                }),
                grpc_settings: (network == Network::Grpc).then(|| GrpcSettings {
                    service_name: "grpc-service".to_string(),
                }),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct NewInbound {
        pub remark: String,
        pub port: u16,
        pub protocol: String,
        pub stream_settings: StreamSettings,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct InboundToggle {
        pub enabled: bool,
    }

    /// Body of `POST /api/v1/inbounds/{id}/clients`.
    ///
    /// `expiry_days` is a raw day count converted by the panel; `0` means no expiry.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct NewClient {
        pub remark: String,
        pub subscription_remark: String,
        pub total_mb: u64,
        pub expiry_days: u32,
    }

    /// Partial update for `PUT /api/v1/clients/{id}`. Absent fields are left unchanged.
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct ClientUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub enabled: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub total_mb: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub expiry_time: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub reset_traffic: Option<bool>,
    }

    /// Error payload returned with 4xx/5xx responses.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ErrorBody {
        #[serde(default)]
        pub detail: serde_json::Value,
    }

    impl ErrorBody {
        /// Validation errors carry a structured `detail`; those are shown as raw JSON.
        pub fn message(&self) -> Option<String> {
            match &self.detail {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::api::*;
    use serde_json::json;

    #[test]
    fn stream_settings_carry_transport_specific_blocks() {
        let ws = serde_json::to_value(StreamSettings::for_network(Network::Ws)).unwrap();
        assert_eq!(
            ws,
            json!({"network": "ws", "security": "none", "wsSettings": {"path": "/"}})
        );

        let grpc = serde_json::to_value(StreamSettings::for_network(Network::Grpc)).unwrap();
        assert_eq!(grpc["grpcSettings"]["serviceName"], "grpc-service");
        assert!(grpc.get("wsSettings").is_none());

        let tcp = serde_json::to_value(StreamSettings::for_network(Network::Tcp)).unwrap();
        assert_eq!(tcp, json!({"network": "tcp", "security": "none"}));
    }

    #[test]
    fn client_update_omits_unchanged_fields() {
        let update = ClientUpdate {
            enabled: Some(false),
            expiry_time: Some(0),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(update).unwrap(),
            json!({"enabled": false, "expiry_time": 0})
        );
    }

    #[test]
    fn client_accepts_either_subscription_field_name() {
        let client: Client = serde_json::from_value(json!({
            "id": 7,
            "remark": "alice",
            "subscription_remark": "alice-sub",
            "enabled": true
        }))
        .unwrap();
        assert_eq!(client.sub_remark, "alice-sub");
        assert_eq!(client.total_gb, 0.0);
        assert_eq!(client.config_link_domain, None);
    }

    #[test]
    fn error_body_message_handles_structured_detail() {
        let plain: ErrorBody = serde_json::from_value(json!({"detail": "Port in use."})).unwrap();
        assert_eq!(plain.message().as_deref(), Some("Port in use."));

        let missing: ErrorBody = serde_json::from_value(json!({"error": "x"})).unwrap();
        assert_eq!(missing.message(), None);

        let listed: ErrorBody =
            serde_json::from_value(json!({"detail": [{"msg": "field required"}]})).unwrap();
        assert_eq!(listed.message().as_deref(), Some(r#"[{"msg":"field required"}]"#));
    }

    #[test]
    fn network_parses_case_insensitively() {
        assert_eq!("GRPC".parse::<Network>(), Ok(Network::Grpc));
        assert!("quic".parse::<Network>().is_err());
    }
}
