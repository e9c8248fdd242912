//! Settings persistence in internal flash.
//!
//! Uses the nRF52840's internal flash via the `sequential-storage` map
//! API, which handles wear levelling and garbage collection across the
//! reserved pages. Two keys live in the map: the general settings
//! record and the lighting engine's own block.

use defmt::{error, info};
use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_nrf::nvmc::Nvmc;

use sleeplink::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use sleeplink::error::Error;
use sleeplink::settings::{UserConfig, USER_CONFIG_SIZE};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

/// Map key for the general settings record.
const KEY_USER_CONFIG: u8 = 0x01;

/// Map key for the lighting engine's block.
const KEY_LIGHTING: u8 = 0x02;

/// Scratch size for map operations.
const MAX_RECORD_SIZE: usize = 64;

/// Flash-backed settings store.
///
/// The NVMC driver is blocking; `BlockingAsync` lifts it into the
/// async storage API that `sequential-storage` expects.
pub struct FlashStore {
    flash: BlockingAsync<Nvmc<'static>>,
    /// Lighting block bytes are staged here by the LED engine before a
    /// flush.
    pub lighting_block: [u8; 16],
}

impl FlashStore {
    pub fn new(flash: Nvmc<'static>) -> Self {
        Self {
            flash: BlockingAsync::new(flash),
            lighting_block: [0; 16],
        }
    }

    async fn fetch(&mut self, key: u8, out: &mut [u8]) -> Option<usize> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        match sequential_storage::map::fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &key,
        )
        .await
        {
            Ok(Some(data)) if data.len() <= out.len() => {
                out[..data.len()].copy_from_slice(data);
                Some(data.len())
            }
            Ok(_) => None,
            Err(e) => {
                error!("flash: read error: {:?}", defmt::Debug2Format(&e));
                None
            }
        }
    }

    async fn store(&mut self, key: u8, item: &[u8]) -> Result<(), Error> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        sequential_storage::map::store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut sequential_storage::cache::NoCache::new(),
            &mut buf,
            &key,
            &item,
        )
        .await
        .map_err(|e| {
            error!("flash: write error: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })
    }

    /// Read the settings record; absent or corrupt reads as `None`.
    pub fn read_settings_blocking(&mut self) -> Option<UserConfig> {
        let mut raw = [0u8; USER_CONFIG_SIZE];
        let len = embassy_futures::block_on(self.fetch(KEY_USER_CONFIG, &mut raw))?;
        UserConfig::deserialize(&raw[..len])
    }

    /// Write the settings record.
    pub fn write_settings_blocking(&mut self, config: &UserConfig) -> Result<(), Error> {
        let mut raw = [0u8; USER_CONFIG_SIZE];
        if config.serialize(&mut raw) == 0 {
            return Err(Error::BufferOverflow);
        }
        embassy_futures::block_on(self.store(KEY_USER_CONFIG, &raw))?;
        info!("flash: settings written");
        Ok(())
    }

    /// Write the staged lighting block.
    pub fn write_lighting_blocking(&mut self) -> Result<(), Error> {
        let block = self.lighting_block;
        embassy_futures::block_on(self.store(KEY_LIGHTING, &block))?;
        info!("flash: lighting block written");
        Ok(())
    }
}
