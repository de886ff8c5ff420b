use crate::api;
use crate::config::Upstreams;
use crate::upstream::UpstreamClient;
use tokio::net::TcpListener;

pub fn upstreams_config(token_url: &str, answer_url: &str) -> Upstreams {
    Upstreams {
        token_url: token_url.parse().unwrap(),
        answer_url: answer_url.parse().unwrap(),
        timeout_secs: 1,
        connect_timeout_secs: 1,
    }
}

/// URL on a local port that was just released, so connections are refused.
pub async fn refused_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    format!("http://127.0.0.1:{port}{path}")
}

/// Serves the relay API on an ephemeral port and returns its base URL.
pub async fn spawn_relay(token_url: &str, answer_url: &str) -> String {
    let client = UpstreamClient::new(&upstreams_config(token_url, answer_url)).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        api::serve(listener, client).await.unwrap();
    });

    format!("http://{addr}")
}
