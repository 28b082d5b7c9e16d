use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorFamily {
    Execution,
    Data,
    Integration,
    Network,
}

impl ErrorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorFamily::Execution => "execution",
            ErrorFamily::Data => "data",
            ErrorFamily::Integration => "integration",
            ErrorFamily::Network => "network",
        }
    }
}

/// Generates `ErrorKind` with its stable code table and family lookup.
macro_rules! error_kinds {
    ($( $family:ident { $( $variant:ident => $code:literal ),+ $(,)? } )+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum ErrorKind {
            $($( $variant, )+)+
        }

        impl ErrorKind {
            pub const ALL: &'static [ErrorKind] = &[ $($( ErrorKind::$variant, )+)+ ];

            pub fn code(&self) -> &'static str {
                match self {
                    $($( ErrorKind::$variant => $code, )+)+
                }
            }

            pub fn family(&self) -> ErrorFamily {
                match self {
                    $($( ErrorKind::$variant => ErrorFamily::$family, )+)+
                }
            }

            pub fn from_code(code: &str) -> Option<Self> {
                match code {
                    $($( $code => Some(ErrorKind::$variant), )+)+
                    _ => None,
                }
            }
        }
    };
}

error_kinds! {
    Execution {
        Parse => "EXEC_PARSE",
        Runtime => "EXEC_RUNTIME",
        Timeout => "EXEC_TIMEOUT",
        Memory => "EXEC_MEMORY",
        Security => "EXEC_SECURITY",
        Validation => "EXEC_VALIDATION",
        Dependency => "EXEC_DEPENDENCY",
        Initialization => "EXEC_INIT",
        Cleanup => "EXEC_CLEANUP",
        Configuration => "EXEC_CONFIG",
        Permission => "EXEC_PERMISSION",
        Resource => "EXEC_RESOURCE",
        Network => "EXEC_NETWORK",
        Storage => "EXEC_STORAGE",
        Format => "EXEC_FORMAT",
        Version => "EXEC_VERSION",
        Compatibility => "EXEC_COMPATIBILITY",
        Isolation => "EXEC_ISOLATION",
        Thread => "EXEC_THREAD",
        Communication => "EXEC_COMMUNICATION",
        Abort => "EXEC_ABORT",
        Crash => "EXEC_CRASH",
        Deadlock => "EXEC_DEADLOCK",
        Corruption => "EXEC_CORRUPTION",
        Unknown => "EXEC_UNKNOWN",
    }
    Data {
        DataValidation => "DATA_VALIDATION",
        DataFormat => "DATA_FORMAT",
        DataEncoding => "DATA_ENCODING",
        DataParsing => "DATA_PARSING",
        DataTransformation => "DATA_TRANSFORMATION",
        DataCorruption => "DATA_CORRUPTION",
        DataIncomplete => "DATA_INCOMPLETE",
        DataTooLarge => "DATA_TOO_LARGE",
        DataEmpty => "DATA_EMPTY",
        DataDuplicate => "DATA_DUPLICATE",
        DataInconsistent => "DATA_INCONSISTENT",
        DataTypeMismatch => "DATA_TYPE_MISMATCH",
        DataSchema => "DATA_SCHEMA",
        DataSerialization => "DATA_SERIALIZATION",
        DataDeserialization => "DATA_DESERIALIZATION",
        DataCompression => "DATA_COMPRESSION",
        DataDecompression => "DATA_DECOMPRESSION",
        DataEncryption => "DATA_ENCRYPTION",
        DataDecryption => "DATA_DECRYPTION",
        DataIntegrity => "DATA_INTEGRITY",
        DataTruncated => "DATA_TRUNCATED",
        DataOverflow => "DATA_OVERFLOW",
        DataUnderflow => "DATA_UNDERFLOW",
        DataPrecision => "DATA_PRECISION",
        DataUnknown => "DATA_UNKNOWN",
    }
    Integration {
        IntegrationConfig => "INTEG_CONFIG",
        IntegrationAuth => "INTEG_AUTH",
        IntegrationPermission => "INTEG_PERMISSION",
        IntegrationVersion => "INTEG_VERSION",
        IntegrationProtocol => "INTEG_PROTOCOL",
        IntegrationEndpoint => "INTEG_ENDPOINT",
        IntegrationQuota => "INTEG_QUOTA",
        IntegrationDeprecated => "INTEG_DEPRECATED",
        IntegrationUnavailable => "INTEG_UNAVAILABLE",
        IntegrationMaintenance => "INTEG_MAINTENANCE",
        IntegrationTimeout => "INTEG_TIMEOUT",
        IntegrationResponse => "INTEG_RESPONSE",
        IntegrationMapping => "INTEG_MAPPING",
        IntegrationSync => "INTEG_SYNC",
        IntegrationConflict => "INTEG_CONFLICT",
        IntegrationDependency => "INTEG_DEPENDENCY",
        IntegrationCircuitOpen => "INTEG_CIRCUIT_OPEN",
        IntegrationWebhook => "INTEG_WEBHOOK",
        IntegrationCallback => "INTEG_CALLBACK",
        IntegrationSession => "INTEG_SESSION",
        IntegrationToken => "INTEG_TOKEN",
        IntegrationScope => "INTEG_SCOPE",
        IntegrationRegion => "INTEG_REGION",
        IntegrationLimit => "INTEG_LIMIT",
        IntegrationUnknown => "INTEG_UNKNOWN",
    }
    Network {
        NetworkUnreachable => "NET_UNREACHABLE",
        ConnectionRefused => "NET_CONNECTION_REFUSED",
        ConnectionReset => "NET_CONNECTION_RESET",
        ConnectionTimeout => "NET_CONNECTION_TIMEOUT",
        DnsResolution => "NET_DNS_RESOLUTION",
        TlsHandshake => "NET_TLS_HANDSHAKE",
        CertificateInvalid => "NET_CERTIFICATE_INVALID",
        Proxy => "NET_PROXY",
        RateLimit => "NET_RATE_LIMIT",
        HttpBadRequest => "HTTP_400",
        HttpUnauthorized => "HTTP_401",
        HttpForbidden => "HTTP_403",
        HttpNotFound => "HTTP_404",
        HttpMethodNotAllowed => "HTTP_405",
        HttpConflict => "HTTP_409",
        HttpPayloadTooLarge => "HTTP_413",
        HttpServerError => "HTTP_500",
        HttpBadGateway => "HTTP_502",
        HttpServiceUnavailable => "HTTP_503",
        HttpGatewayTimeout => "HTTP_504",
        ApiInvalidResponse => "API_INVALID_RESPONSE",
        ApiSchemaChanged => "API_SCHEMA_CHANGED",
        ApiDeprecated => "API_DEPRECATED",
        CorsBlocked => "NET_CORS_BLOCKED",
        NetworkUnknown => "NET_UNKNOWN",
    }
}

impl ErrorKind {
    /// Kinds for which a caller-driven retry can plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::Network
                | ErrorKind::DataValidation
                | ErrorKind::IntegrationTimeout
                | ErrorKind::NetworkUnreachable
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionTimeout
                | ErrorKind::DnsResolution
                | ErrorKind::RateLimit
                | ErrorKind::HttpServiceUnavailable
                | ErrorKind::HttpGatewayTimeout
        )
    }

    pub fn suggested_backoff(&self) -> Option<Duration> {
        match self {
            ErrorKind::RateLimit | ErrorKind::IntegrationQuota => Some(Duration::from_secs(60)),
            ErrorKind::Timeout
            | ErrorKind::IntegrationTimeout
            | ErrorKind::ConnectionTimeout
            | ErrorKind::HttpGatewayTimeout => Some(Duration::from_secs(5)),
            ErrorKind::Network
            | ErrorKind::NetworkUnreachable
            | ErrorKind::ConnectionReset
            | ErrorKind::DnsResolution
            | ErrorKind::HttpServiceUnavailable => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    pub fn suggestions(&self) -> Vec<&'static str> {
        let specific: &[&'static str] = match self {
            ErrorKind::Timeout => &[
                "Increase the execution timeout for this unit",
                "Reduce the size of the input payload",
            ],
            ErrorKind::Memory => &["Raise the memory ceiling or process smaller inputs"],
            ErrorKind::Security | ErrorKind::Permission => {
                &["Review the sandbox policy for the capability this unit requires"]
            }
            ErrorKind::Validation | ErrorKind::DataValidation => {
                &["Check that the scan result contains the fields this unit accepts"]
            }
            ErrorKind::Initialization => &["Verify the unit is registered and its descriptor is complete"],
            ErrorKind::Configuration => &["Check the unit parameters against its configuration schema"],
            ErrorKind::Resource => &["Retry after in-flight executions complete"],
            ErrorKind::RateLimit => &["Wait before retrying; the remote service is throttling requests"],
            ErrorKind::DnsResolution => &["Verify the target host name resolves"],
            ErrorKind::CertificateInvalid | ErrorKind::TlsHandshake => {
                &["Inspect the target's TLS configuration"]
            }
            _ => &[],
        };

        let general: &[&'static str] = match self.family() {
            ErrorFamily::Execution => &["Inspect the unit's processing steps for the failing stage"],
            ErrorFamily::Data => &["Inspect the upstream OSINT payload for malformed values"],
            ErrorFamily::Integration => &["Check the external integration's configuration and status"],
            ErrorFamily::Network => &["Check connectivity to the target and the sandbox allow-list"],
        };

        specific.iter().chain(general.iter()).copied().collect()
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation
                | ErrorKind::DataValidation
                | ErrorKind::DataSchema
                | ErrorKind::DataTypeMismatch
        )
    }

    pub fn is_network(&self) -> bool {
        matches!(self.family(), ErrorFamily::Network) || matches!(self, ErrorKind::Network)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
