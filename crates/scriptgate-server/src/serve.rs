use axum::{Router, extract::ConnectInfo, http::Request};
use hyper::body::Incoming;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tower::ServiceExt;
use tracing::{debug, error, info, warn};

/// Accepts connections until `shutdown` resolves. Each connection runs on
/// its own task; requests see the peer address as `ConnectInfo`.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    tls: Option<TlsAcceptor>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received, no longer accepting connections");
                break;
            }
            accept = listener.accept() => {
                match accept {
                    Ok((stream, peer_addr)) => {
                        tokio::spawn(handle_connection(stream, peer_addr, app.clone(), tls.clone()));
                    }
                    Err(err) => {
                        error!(error = %err, "Accept error");
                    }
                }
            }
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    app: Router,
    tls: Option<TlsAcceptor>,
) {
    let service = TowerToHyperService::new(app.map_request(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(ConnectInfo(peer_addr));
        req
    }));

    let result = match tls {
        Some(acceptor) => match acceptor.accept(stream).await {
            Ok(tls_stream) => {
                Builder::new(TokioExecutor::default())
                    .serve_connection(TokioIo::new(tls_stream), service)
                    .await
            }
            Err(err) => {
                debug!(%peer_addr, error = %err, "TLS handshake failed");
                return;
            }
        },
        None => {
            Builder::new(TokioExecutor::default())
                .serve_connection(TokioIo::new(stream), service)
                .await
        }
    };

    if let Err(err) = result {
        if is_client_hangup(&*err) {
            debug!(%peer_addr, error = %err, "Connection closed by client");
        } else {
            warn!(%peer_addr, error = %err, "Connection ended with error");
        }
    }
}

/// True when the peer went away mid-exchange, which is routine for
/// cancelled script streams.
fn is_client_hangup(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(hyper_err) = err.downcast_ref::<hyper::Error>()
            && (hyper_err.is_incomplete_message() || hyper_err.is_canceled())
        {
            return true;
        }
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return true;
        }
        current = err.source();
    }
    false
}
