use aws_sdk_bedrockruntime::Client;

/// Bedrock runtime client from a loaded SDK config.
pub fn client_from_config(config: &aws_config::SdkConfig) -> Client {
    Client::new(config)
}
