use crate::client::config::Config;
use crate::client::consts::{AUTHORIZATION_HEADER, OPENAI_BETA_HEADER};
use crate::client::error::ClientError;
use secrecy::ExposeSecret;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn build_request(config: &Config) -> Result<Request, ClientError> {
    let mut request = config.endpoint().into_client_request()?;
    request.headers_mut().insert(
        AUTHORIZATION_HEADER,
        format!("Bearer {}", config.api_key().expose_secret()).parse()?,
    );
    request
        .headers_mut()
        .insert(OPENAI_BETA_HEADER, "realtime=v1".parse()?);
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_model_and_auth_headers() {
        let config = Config::new(secrecy::SecretString::from("sk-test".to_string()))
            .with_base_url("wss://example.test/v1")
            .with_model("realtime-model");

        let request = build_request(&config).unwrap();

        assert_eq!(
            request.uri().to_string(),
            "wss://example.test/v1/realtime?model=realtime-model"
        );
        assert_eq!(request.headers()[AUTHORIZATION_HEADER], "Bearer sk-test");
        assert_eq!(request.headers()[OPENAI_BETA_HEADER], "realtime=v1");
    }
}
