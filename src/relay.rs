//! On/off output channel.

use tracing::debug;

use crate::address::BitAddress;
use crate::error::MotionResult;
use crate::register::Toggle;
use crate::transport::{RegisterTransport, SharedLink};
use crate::value::Readback;

/// A relay is one toggle with enable/disable wording.
#[derive(Debug, Clone)]
pub struct Relay<T> {
    switch: Toggle<T>,
}

impl<T: RegisterTransport> Relay<T> {
    pub fn new(link: SharedLink<T>, switch: BitAddress) -> Self {
        Self {
            switch: Toggle::new(link, switch),
        }
    }

    pub fn address(&self) -> BitAddress {
        self.switch.address()
    }

    pub async fn enable(&self) -> MotionResult<Readback<bool>> {
        self.set(true).await
    }

    pub async fn disable(&self) -> MotionResult<Readback<bool>> {
        self.set(false).await
    }

    pub async fn set(&self, on: bool) -> MotionResult<Readback<bool>> {
        let readback = self.switch.write(on).await?;
        debug!(
            relay = %self.switch.address(),
            on,
            verified = readback.is_verified(),
            "relay switched"
        );
        Ok(readback)
    }

    pub async fn is_enabled(&self) -> MotionResult<bool> {
        self.switch.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryTransport;

    #[tokio::test]
    async fn test_enable_disable() {
        let link = SharedLink::new(MemoryTransport::new().with_register(2000, 0xFF00));
        let relay = Relay::new(link.clone(), BitAddress::new(2000, 2).unwrap());

        assert!(!relay.is_enabled().await.unwrap());
        assert!(relay.enable().await.unwrap().is_verified());
        assert!(relay.is_enabled().await.unwrap());
        assert_eq!(link.read(2000).await.unwrap(), 0xFF04);

        relay.disable().await.unwrap();
        assert!(!relay.is_enabled().await.unwrap());
        assert_eq!(link.read(2000).await.unwrap(), 0xFF00);
    }
}
