// Market data module entrypoint
pub mod adapters;   // venue-specific connectors (MEXC)
pub mod directory;  // REST: instrument list + 24h volume
pub mod feed;       // connection state machine
pub mod normaliser; // converts wire strings -> prices/volumes
pub mod order_book; // latest top-of-book per symbol
pub mod router;     // read loop: feed -> books -> spreads -> hub
