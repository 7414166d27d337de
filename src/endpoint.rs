use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::coding::{Reader, Writer};
use crate::data::StreamParser;
use crate::error::SessionError;
use crate::session::{self, Config, Session, SessionMessage};
use crate::transport::{Connection, Perspective, Protocol};

/// Drives a [`Session`] over a connection.
///
/// Owns the control stream and runs the session's loops: the control pump,
/// one task per incoming data stream, and the datagram loop.
#[must_use = "run() must be called"]
pub struct Endpoint<C: Connection> {
	conn: C,
	session: Session,
	control: (Writer<C::SendStream>, Reader<C::RecvStream>),
}

impl<C: Connection> Endpoint<C> {
	/// Connect as a client: open the control stream and queue the CLIENT_SETUP.
	///
	/// The handshake completes while [`run`](Endpoint::run) is executing;
	/// session operations wait for it internally.
	pub async fn connect(
		conn: C,
		protocol: Protocol,
		config: Config,
	) -> Result<(Self, Session, mpsc::Receiver<SessionMessage>), SessionError> {
		let (send, recv) = conn.open_bi().await?;
		let (session, messages) = Session::new(Perspective::Client, protocol, config);

		let endpoint = Self {
			conn,
			session: session.clone(),
			control: (Writer::new(send), Reader::new(recv)),
		};

		Ok((endpoint, session, messages))
	}

	/// Accept as a server: take over the peer's control stream.
	pub async fn accept(
		conn: C,
		protocol: Protocol,
		config: Config,
	) -> Result<(Self, Session, mpsc::Receiver<SessionMessage>), SessionError> {
		let (send, recv) = conn.accept_bi().await?;
		let (session, messages) = Session::new(Perspective::Server, protocol, config);

		let endpoint = Self {
			conn,
			session: session.clone(),
			control: (Writer::new(send), Reader::new(recv)),
		};

		Ok((endpoint, session, messages))
	}

	/// Run the session until it fails or is closed.
	///
	/// When any loop errors, every pending request observes the cause and the
	/// connection is closed with the matching application error code.
	pub async fn run(self) -> Result<(), SessionError> {
		let Self {
			conn,
			session,
			control: (mut writer, mut reader),
		} = self;

		let res = tokio::select! {
			res = session::run_send(&session, &mut writer) => res,
			res = session::run_recv(&session, &mut reader) => res,
			res = Self::run_uni(&conn, &session) => res,
			res = Self::run_datagrams(&conn, &session) => res,
		};

		let err = res.expect_err("run terminated with OK");
		session.close(err.clone());
		conn.close(err.code(), &err.to_string());

		Err(err)
	}

	async fn run_uni(conn: &C, session: &Session) -> Result<(), SessionError> {
		let mut tasks = FuturesUnordered::new();

		loop {
			tokio::select! {
				res = conn.accept_uni() => {
					let stream = res?;
					let session = session.clone();

					tasks.push(async move {
						let parser = StreamParser::accept(Reader::new(stream)).await?;
						session.handle_uni_stream(parser).await
					});
				},
				res = tasks.next(), if !tasks.is_empty() => res.unwrap()?,
			};
		}
	}

	async fn run_datagrams(conn: &C, session: &Session) -> Result<(), SessionError> {
		loop {
			let payload = conn.recv_datagram().await?;
			session.handle_datagram(payload)?;
		}
	}
}
