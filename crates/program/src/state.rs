//! Ledger state for the auction program.

use std::collections::{BTreeMap, HashMap};

use sealbid_types::{Address, Auction, Bid};

use crate::events::ProgramEvent;

/// Program state.
///
/// Plain in-memory maps; every handler validates fully before it mutates,
/// so a rejected instruction leaves this untouched.
#[derive(Debug, Default)]
pub struct ProgramState {
    /// Auctions by derived address
    pub auctions: BTreeMap<Address, Auction>,

    /// Bids by derived address
    pub bids: BTreeMap<Address, Bid>,

    /// Bid addresses per auction, in first-placement order
    pub auction_bids: HashMap<Address, Vec<Address>>,

    /// Native balances
    pub balances: HashMap<Address, u64>,

    /// Append-only event log
    pub events: Vec<ProgramEvent>,
}

impl ProgramState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_auction(&self, address: &Address) -> Option<&Auction> {
        self.auctions.get(address)
    }

    pub fn get_bid(&self, address: &Address) -> Option<&Bid> {
        self.bids.get(address)
    }

    /// Get all bids for an auction with their addresses.
    pub fn get_auction_bids(&self, auction: &Address) -> Vec<(Address, &Bid)> {
        self.auction_bids
            .get(auction)
            .map(|addresses| {
                addresses
                    .iter()
                    .filter_map(|address| self.bids.get(address).map(|bid| (*address, bid)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get_balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, address: Address, amount: u64) {
        let balance = self.balances.entry(address).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Move `amount` from `from` to `to`. Returns false without moving
    /// anything if `from` cannot cover it.
    pub fn transfer(&mut self, from: &Address, to: Address, amount: u64) -> bool {
        match self.balances.get_mut(from) {
            Some(balance) if *balance >= amount => {
                *balance -= amount;
            }
            _ => return false,
        }
        self.credit(to, amount);
        true
    }

    pub fn emit(&mut self, event: ProgramEvent) {
        self.events.push(event);
    }

    pub fn events_for(&self, auction: &Address) -> Vec<ProgramEvent> {
        self.events
            .iter()
            .filter(|event| event.auction() == auction)
            .cloned()
            .collect()
    }
}
