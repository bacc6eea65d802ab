use crate::error::ProtocolError;
use crate::message::{PeerId, Response};

use proof_essentials::commitment::HashCommitment;
use sha2::Sha256;

/// The participants of a game in their agreed order, plus the local peer.
/// Every peer sorts the same ids the same way, so seat indices agree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerGroup {
    peers: Vec<PeerId>,
    me: usize,
}

impl PeerGroup {
    pub fn new<I>(peers: I, me: &PeerId) -> Result<Self, ProtocolError>
    where
        I: IntoIterator<Item = PeerId>,
    {
        let mut peers: Vec<PeerId> = peers.into_iter().collect();
        peers.sort();
        peers.dedup();
        let me = peers
            .iter()
            .position(|p| p == me)
            .ok_or_else(|| ProtocolError::UnknownPeer(me.clone()))?;
        Ok(Self { peers, me })
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn me(&self) -> usize {
        self.me
    }

    pub fn my_id(&self) -> &PeerId {
        &self.peers[self.me]
    }

    pub fn peers(&self) -> &[PeerId] {
        &self.peers
    }

    pub fn peer(&self, index: usize) -> Option<&PeerId> {
        self.peers.get(index)
    }

    pub fn index_of(&self, peer: &PeerId) -> Result<usize, ProtocolError> {
        self.peers
            .iter()
            .position(|p| p == peer)
            .ok_or_else(|| ProtocolError::UnknownPeer(peer.clone()))
    }

    /// Same for every peer that agrees on membership and order.
    pub fn order_digest(&self) -> String {
        let joined: Vec<&str> = self.peers.iter().map(|p| p.0.as_str()).collect();
        HashCommitment::<Sha256>::commit(&joined.join(" "))
    }

    /// The message sent by the peer in seat `index` this round.
    pub fn response_from<'a>(
        &self,
        responses: &'a [Response],
        index: usize,
    ) -> Result<&'a Response, ProtocolError> {
        let peer = self
            .peer(index)
            .ok_or_else(|| ProtocolError::MalformedMove(format!("no seat {}", index)))?;
        responses
            .iter()
            .find(|r| &r.sender == peer)
            .ok_or_else(|| ProtocolError::MalformedMove(format!("no message from {}", peer)))
    }

    /// Seat index of every sender, rejecting strangers, missing peers and
    /// peers that spoke twice.
    pub fn check_round(&self, responses: &[Response]) -> Result<Vec<usize>, ProtocolError> {
        let seats = responses
            .iter()
            .map(|r| self.index_of(&r.sender))
            .collect::<Result<Vec<_>, _>>()?;
        let mut distinct = seats.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() != seats.len() {
            return Err(ProtocolError::MalformedMove(format!(
                "{} duplicate messages in round",
                seats.len() - distinct.len()
            )));
        }
        if distinct.len() != self.len() {
            return Err(ProtocolError::MalformedMove(format!(
                "expected messages from {} peers, got {}",
                self.len(),
                distinct.len()
            )));
        }
        Ok(seats)
    }
}
