//! Wire channel specs
//!
//! Transport edges the way an embedding application sees them: a peer
//! that hangs up must fail the channel, never stall it.

use tokio::io::duplex;
use weft_interface::{Channel, ChannelError, ComError, Packet};

#[tokio::test]
async fn writing_after_the_peer_hung_up_fails_fast() {
    let (left, right) = duplex(1024);
    let mut channel = Channel::new(left);
    drop(right);

    let error = channel
        .write_packet(&Packet::CycleEnd { cycle_index: 0 })
        .await
        .unwrap_err();
    assert!(matches!(error, ChannelError::Com(ComError::ClosedPeer)));
}

#[tokio::test]
async fn a_hangup_while_reading_is_a_closed_peer() {
    let (left, right) = duplex(1024);
    let mut channel = Channel::new(left);
    drop(right);

    let error = channel.read_packet(None).await.unwrap_err();
    assert!(matches!(error, ChannelError::Com(ComError::ClosedPeer)));
}
