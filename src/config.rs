#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Entry point o bundle del progetto Remotion
    pub serve_url: String,
    pub composition_id: String,
    pub codec: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            serve_url: "remotion/index.ts".to_string(),
            composition_id: "QuizVideo".to_string(),
            codec: "h264".to_string(),
            telegram_bot_token: None,
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(host) = std::env::var("RENDERTY_HOST") {
            config.host = host;
        }

        if let Ok(port) = std::env::var("RENDERTY_PORT").or_else(|_| std::env::var("PORT")) {
            if let Ok(p) = port.parse() {
                config.port = p;
            }
        }

        if let Ok(serve_url) = std::env::var("REMOTION_SERVE_URL") {
            config.serve_url = serve_url;
        }

        if let Ok(composition_id) = std::env::var("RENDERTY_COMPOSITION_ID") {
            config.composition_id = composition_id;
        }

        if let Ok(codec) = std::env::var("RENDERTY_CODEC") {
            config.codec = codec;
        }

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.trim().is_empty() {
                config.telegram_bot_token = Some(token);
            }
        }

        if let Ok(api_base) = std::env::var("RENDERTY_TELEGRAM_API_BASE") {
            config.telegram_api_base = api_base;
        }

        config
    }
}
