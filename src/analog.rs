//! Analog input channel: a float the device updates on its own.

use tracing::trace;

use crate::bytes::ByteOrder;
use crate::error::MotionResult;
use crate::register::FloatRegister;
use crate::transport::{RegisterTransport, SharedLink};

#[derive(Debug, Clone)]
pub struct Analog<T> {
    input: FloatRegister<T>,
}

impl<T: RegisterTransport> Analog<T> {
    pub fn new(link: SharedLink<T>, address: u16) -> MotionResult<Self> {
        Ok(Self {
            input: FloatRegister::new(link, address)?,
        })
    }

    pub fn with_order(link: SharedLink<T>, address: u16, order: ByteOrder) -> MotionResult<Self> {
        Ok(Self {
            input: FloatRegister::with_order(link, address, order)?,
        })
    }

    pub fn address(&self) -> u16 {
        self.input.address()
    }

    pub async fn read(&self) -> MotionResult<f32> {
        let value = self.input.read().await?;
        trace!(address = self.input.address(), value, "analog sample");
        Ok(value)
    }
}
