use crate::coding::{Reader, Writer};
use crate::error::SessionError;
use crate::message::Message;
use crate::transport::{RecvStream, SendStream};

use super::Session;

// The two halves of the control stream pump. They are the only writers of
// the control stream, so messages hit the wire in enqueue order and arrive
// at the session in wire order. A failure in either loop is fatal; the
// driver tears the session down with the returned error.

pub(crate) async fn run_send<S: SendStream>(session: &Session, writer: &mut Writer<S>) -> Result<(), SessionError> {
	loop {
		let msg = session.next_control_message().await?;
		log::debug!("sending message: {:?}", msg);
		writer.encode(&msg).await?;
	}
}

pub(crate) async fn run_recv<R: RecvStream>(session: &Session, reader: &mut Reader<R>) -> Result<(), SessionError> {
	loop {
		let msg: Message = reader.decode().await?;
		session.receive(msg).await?;
	}
}
