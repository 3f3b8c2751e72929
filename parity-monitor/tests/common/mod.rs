use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use envconfig::Envconfig;
use reqwest::header::CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use parity_monitor::config::Config;
use parity_monitor::server::serve;

/// On-demand only: no polling, no global recorder.
pub fn config_for(primary_url: &str, secondary_url: &str, directory_url: &str) -> Config {
    let env = HashMap::from([
        ("PRIMARY_URL".to_owned(), primary_url.to_owned()),
        ("SECONDARY_URL".to_owned(), secondary_url.to_owned()),
        ("TEAM_DIRECTORY_URL".to_owned(), directory_url.to_owned()),
        ("SCHEDULER_ENABLED".to_owned(), "false".to_owned()),
        ("EXPORT_PROMETHEUS".to_owned(), "false".to_owned()),
        ("FETCH_FULL_HISTORY".to_owned(), "true".to_owned()),
    ]);
    Config::init_from_hashmap(&env).expect("test config is valid")
}

pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl ServerHandle {
    pub async fn for_config(config: Config) -> ServerHandle {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let notify = Arc::new(Notify::new());
        let shutdown = notify.clone();

        tokio::spawn(async move {
            serve(config, listener, async move { notify.notified().await }).await
        });
        ServerHandle { addr, shutdown }
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("http://{}{}", self.addr, path))
            .send()
            .await
            .expect("failed to send request")
    }

    pub async fn run_comparison<T: Into<reqwest::Body>>(&self, body: T) -> reqwest::Response {
        reqwest::Client::new()
            .post(format!("http://{}/api/v1/comparison/run", self.addr))
            .body(body)
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .expect("failed to send request")
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.shutdown.notify_one()
    }
}
