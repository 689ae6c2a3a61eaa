use shared::domain::AccountAddress;
use tokio::sync::watch;

/// Source of the connected wallet account.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<AccountAddress>;
    fn subscribe(&self) -> watch::Receiver<Option<AccountAddress>>;
}

/// In-memory identity, switched explicitly by whoever owns the wallet
/// connection.
pub struct WatchIdentity {
    tx: watch::Sender<Option<AccountAddress>>,
}

impl WatchIdentity {
    pub fn new(initial: Option<AccountAddress>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn connect(&self, address: AccountAddress) {
        self.set(Some(address));
    }

    pub fn disconnect(&self) {
        self.set(None);
    }

    fn set(&self, next: Option<AccountAddress>) {
        self.tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

impl IdentityProvider for WatchIdentity {
    fn current(&self) -> Option<AccountAddress> {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AccountAddress>> {
        self.tx.subscribe()
    }
}
