// ABOUTME: bb8 connection manager that drops clients abandoned mid-statement
// ABOUTME: Wraps bb8-tiberius so a cancelled query never hands its socket to the next caller

use std::ops::{Deref, DerefMut};

use async_trait::async_trait;
use bb8::ManageConnection;
use bb8_tiberius::ConnectionManager;

type TdsClient = <ConnectionManager as ManageConnection>::Connection;

/// Pooled tiberius client with an in-flight mark.
///
/// The mark is set before a statement is sent and cleared once its response
/// has been fully read. A client returned while still marked (its future was
/// dropped by a timeout, or its socket failed) is discarded by the pool.
pub struct GuardedClient {
    client: TdsClient,
    in_flight: bool,
}

impl GuardedClient {
    pub fn begin(&mut self) {
        self.in_flight = true;
    }

    pub fn finish(&mut self) {
        self.in_flight = false;
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }
}

impl Deref for GuardedClient {
    type Target = TdsClient;

    fn deref(&self) -> &Self::Target {
        &self.client
    }
}

impl DerefMut for GuardedClient {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.client
    }
}

pub struct GuardedManager {
    inner: ConnectionManager,
}

impl GuardedManager {
    pub fn new(config: tiberius::Config) -> Self {
        Self {
            inner: ConnectionManager::new(config),
        }
    }
}

#[async_trait]
impl ManageConnection for GuardedManager {
    type Connection = GuardedClient;
    type Error = tiberius::error::Error;

    async fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let client = self.inner.connect().await?;
        Ok(GuardedClient {
            client,
            in_flight: false,
        })
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        self.inner.is_valid(&mut conn.client).await
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        if conn.in_flight() {
            log::warn!("Discarding connection returned mid-statement");
            return true;
        }
        self.inner.has_broken(&mut conn.client)
    }
}
