use std::net::SocketAddr;
use std::sync::Arc;

use mock_server::AppState;

/// Start the mock server on a random port in a background thread.
pub fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, state).await
        })
        .unwrap();
    });

    addr
}

pub fn api_url(addr: SocketAddr) -> String {
    format!("http://{addr}/api")
}
