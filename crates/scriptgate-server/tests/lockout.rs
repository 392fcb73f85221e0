//! Drives a real `scriptgate` process to observe the self-termination that
//! router tests can only simulate.

use std::net::TcpListener;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

const SECRET: &str = "letmein";

struct Server {
    child: Child,
    base_url: String,
    _scripts: tempfile::TempDir,
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn launch(sensitive: &str) -> Server {
    let scripts = tempfile::tempdir().unwrap();
    std::fs::write(scripts.path().join("hello.sh"), "echo hello\n").unwrap();
    let port = free_port();

    let child = Command::new(assert_cmd::cargo::cargo_bin!("scriptgate"))
        .current_dir(scripts.path())
        .env_remove("SCRIPTGATE_CONFIG")
        .env_remove("CERT_FILE")
        .env_remove("KEY_FILE")
        .env_remove("NTFY")
        .args(["--host", "127.0.0.1", "--port", &port.to_string()])
        .args(["--auth-password", SECRET, "--sensitive", sensitive])
        .arg("--scripts-folder")
        .arg(scripts.path())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    Server {
        child,
        base_url: format!("http://127.0.0.1:{}", port),
        _scripts: scripts,
    }
}

async fn wait_until_ready(client: &reqwest::Client, server: &Server) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if client
            .get(format!("{}/status", server.base_url))
            .send()
            .await
            .is_ok()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("scriptgate did not start listening on {}", server.base_url);
}

fn wait_for_exit(child: &mut Child, limit: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    None
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn process_exits_when_threshold_is_reached() {
    let mut server = launch("2");
    let client = client();
    wait_until_ready(&client, &server).await;

    let first = client
        .get(format!("{}/", server.base_url))
        .header("Authorization", "wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), reqwest::StatusCode::UNAUTHORIZED);

    let second = client
        .get(format!("{}/", server.base_url))
        .header("Authorization", "wrong")
        .send()
        .await;
    assert!(second.is_err(), "the tripping request must get no response");

    let status = wait_for_exit(&mut server.child, Duration::from_secs(5))
        .expect("scriptgate should have exited");
    assert_eq!(status.code(), Some(255));
}

#[tokio::test]
async fn disabled_lockout_keeps_serving() {
    let mut server = launch("-1");
    let client = client();
    wait_until_ready(&client, &server).await;

    for _ in 0..5 {
        let response = client
            .get(format!("{}/", server.base_url))
            .header("Authorization", "wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    let response = client
        .post(format!("{}/hello.sh", server.base_url))
        .header("Authorization", SECRET)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "hello\n");

    assert!(server.child.try_wait().unwrap().is_none());
}
