//! Service-account lifecycle: bootstrap, reads, key rotation.
//!
//! All state lives at the distinguished `_service_key` in this service's
//! own bucket. Setup is idempotent under a store mutex; rotation follows
//! the capture/re-read/compare protocol so concurrent rotators converge on
//! exactly one new identity.

use crate::crypto::{PublicKey, SigningPair};
use crate::errors::{FedsvcError, Result};
use crate::service::context::ServiceContext;
use crate::service::service::{Service, ServiceType};
use crate::service::SERVICE_KEY;
use crate::store::StoreMutex;
use tracing::{debug, info};

impl ServiceContext {
    /// Set up the service that will serve at `canonical_url` with the given
    /// type. Idempotent: a second call with the same arguments returns the
    /// existing record; a call with different arguments fails.
    ///
    /// Delete the record at `_service_key` to reset the service. That
    /// assigns a new UID and new key material, so the service has to be
    /// re-introduced to every peer that trusted it.
    pub fn setup_service_info(
        &self,
        canonical_url: &str,
        service_type: ServiceType,
    ) -> Result<Service> {
        let password = self.require_password()?.to_string();

        // only one actor may initialise the record
        let mut mutex = StoreMutex::new(self.store(), self.bucket().clone(), SERVICE_KEY)?;

        let existing = self.store().get_object_from_json(self.bucket(), SERVICE_KEY);

        let service = match existing {
            Some(data) => {
                let service = Service::from_data(&data, Some(&password)).map_err(|e| {
                    FedsvcError::ServiceAccount(format!(
                        "something went wrong reading the service data; either debug the \
                         error or delete the data at key '{}' to allow the service to be \
                         reset: {}",
                        SERVICE_KEY, e
                    ))
                })?;

                if service.service_type() != service_type
                    || service.canonical_url() != canonical_url
                {
                    mutex.unlock()?;
                    return Err(FedsvcError::ServiceAccount(format!(
                        "the existing service has a different type or URL to that requested \
                         at setup: requested {}/{}, actual {}/{}",
                        service_type,
                        canonical_url,
                        service.service_type(),
                        service.canonical_url()
                    )));
                }

                debug!(uid = %service.uid(), "service already set up");
                service
            }
            None => {
                let service = Service::new(canonical_url, service_type)?;

                // serialise and reload before persisting, so a record that
                // cannot be read back is never written
                let data = service.to_data(&password)?;
                let service = Service::from_data(&data, Some(&password))?;
                self.store()
                    .set_object_from_json(self.bucket(), SERVICE_KEY, &data)?;

                info!(uid = %service.uid(), url = %canonical_url, "service set up");
                service
            }
        };

        mutex.unlock()?;
        self.clear_serviceinfo_cache();

        Ok(service)
    }

    /// The raw persisted record, through the data cache.
    fn service_info_data(&self) -> Result<serde_json::Value> {
        if let Some(data) = self.caches().service_data.get(SERVICE_KEY) {
            return Ok(data.clone());
        }

        let data = self
            .store()
            .get_object_from_json(self.bucket(), SERVICE_KEY)
            .ok_or_else(|| {
                FedsvcError::MissingServiceAccount(
                    "you haven't yet created the service account for this service; \
                     please create an account first"
                        .to_string(),
                )
            })?;

        self.caches()
            .service_data
            .put(SERVICE_KEY.to_string(), data.clone());

        Ok(data)
    }

    /// Return the service record. With `need_private_access` the record is
    /// decrypted using the service password (slow, and requires the
    /// password to be configured); otherwise only public material is
    /// exposed.
    pub fn get_service_info(&self, need_private_access: bool) -> Result<Service> {
        if let Some(service) = self.caches().service_object.get(&need_private_access) {
            return Ok(service.clone());
        }

        let data = self.service_info_data()?;
        let password = if need_private_access {
            Some(self.require_password()?.to_string())
        } else {
            None
        };

        let service = Service::from_data(&data, password.as_deref())?;
        self.caches()
            .service_object
            .put(need_private_access, service.clone());

        Ok(service)
    }

    /// Check whether rotation is due and, if so, perform it. Invoked
    /// transparently from the private-material accessors.
    ///
    /// The ordering is deliberate: write the rotated record, release the
    /// lock, THEN archive the old keys. The archive is advisory, so the
    /// window between release and archival can never publish an
    /// inconsistent identity.
    fn refresh_service_keys_and_certs(&self, service: Service) -> Result<Service> {
        if !service.should_refresh_keys() {
            return Ok(service);
        }

        let password = self.require_password()?.to_string();

        let last_update = service.last_key_update();
        let oldkeys = service.dump_keys(&password)?;

        let mut service = service;
        service.refresh_keys()?;

        let mut mutex = StoreMutex::new(self.store(), self.bucket().clone(), service.uid())?;

        let data = self
            .store()
            .get_object_from_json(self.bucket(), SERVICE_KEY)
            .ok_or_else(|| {
                FedsvcError::MissingServiceAccount(
                    "the service record disappeared during rotation".to_string(),
                )
            })?;
        let persisted = Service::from_data(&data, None)?;

        if persisted.last_key_update() == last_update {
            // no-one has beaten us: publish the rotated identity
            self.store()
                .set_object_from_json(self.bucket(), SERVICE_KEY, &service.to_data(&password)?)?;
            mutex.unlock()?;

            let archive_key = format!("{}/oldkeys/{}", SERVICE_KEY, oldkeys.datetime);
            self.store().set_object_from_json(
                self.bucket(),
                &archive_key,
                &serde_json::to_value(&oldkeys)?,
            )?;

            info!(uid = %service.uid(), "rotated service keys");
        } else {
            // another actor rotated first: drop our work and reload theirs
            mutex.unlock()?;
            debug!(uid = %service.uid(), "lost the rotation race; reloading");
        }

        self.clear_serviceinfo_cache();
        self.get_service_info(true)
    }

    /// The private signing key for this service. With a `fingerprint`, the
    /// previous key is consulted when the current one does not match, so
    /// peers holding a recently rotated identity still resolve.
    pub fn get_service_private_key(&self, fingerprint: Option<&str>) -> Result<SigningPair> {
        let service = self.get_service_info(true)?;
        let service = self.refresh_service_keys_and_certs(service)?;

        let mut key = service.private_key()?.clone();

        if let Some(fingerprint) = fingerprint {
            if key.fingerprint() != fingerprint {
                if let Some(last) = service.last_key() {
                    key = last.clone();
                }
            }
            if key.fingerprint() != fingerprint {
                return Err(FedsvcError::ServiceAccount(format!(
                    "cannot find a private key for '{}' that matches the fingerprint {}",
                    service.canonical_url(),
                    fingerprint
                )));
            }
        }

        Ok(key)
    }

    /// The private signing certificate. Certificates do not fall back to
    /// previous material: a signature must always be made with the current
    /// certificate.
    pub fn get_service_private_certificate(
        &self,
        fingerprint: Option<&str>,
    ) -> Result<SigningPair> {
        let service = self.get_service_info(true)?;
        let service = self.refresh_service_keys_and_certs(service)?;

        let cert = service.private_certificate()?.clone();

        if let Some(fingerprint) = fingerprint {
            if cert.fingerprint() != fingerprint {
                return Err(FedsvcError::ServiceAccount(format!(
                    "cannot find a private certificate for '{}' that matches the \
                     fingerprint {}",
                    service.canonical_url(),
                    fingerprint
                )));
            }
        }

        Ok(cert)
    }

    /// The public key for this service, by optional fingerprint with
    /// previous-key fallback.
    pub fn get_service_public_key(&self, fingerprint: Option<&str>) -> Result<PublicKey> {
        let service = self.get_service_info(false)?;
        let mut key = service.public_key().clone();

        if let Some(fingerprint) = fingerprint {
            if key.fingerprint() != fingerprint {
                if let Some(last) = service.last_key() {
                    key = last.public().clone();
                }
            }
            if key.fingerprint() != fingerprint {
                return Err(FedsvcError::ServiceAccount(format!(
                    "cannot find a public key for '{}' that matches the fingerprint {}",
                    service.canonical_url(),
                    fingerprint
                )));
            }
        }

        Ok(key)
    }

    /// The public certificate for this service, by optional fingerprint
    /// with previous-certificate fallback.
    pub fn get_service_public_certificate(&self, fingerprint: Option<&str>) -> Result<PublicKey> {
        let service = self.get_service_info(false)?;
        let mut cert = service.public_certificate().clone();

        if let Some(fingerprint) = fingerprint {
            if cert.fingerprint() != fingerprint {
                if let Some(last) = service.last_certificate() {
                    cert = last.public().clone();
                }
            }
            if cert.fingerprint() != fingerprint {
                return Err(FedsvcError::ServiceAccount(format!(
                    "cannot find a public certificate for '{}' that matches the \
                     fingerprint {}",
                    service.canonical_url(),
                    fingerprint
                )));
            }
        }

        Ok(cert)
    }

    /// UID of the payout account this service holds on the accounting
    /// service with `accounting_service_uid`.
    pub fn get_service_account_uid(&self, accounting_service_uid: &str) -> Result<String> {
        if let Some(uid) = self.caches().account_uid.get(accounting_service_uid) {
            return Ok(uid.clone());
        }

        let key = format!("{}/account/{}", SERVICE_KEY, accounting_service_uid);

        let account_uid = self
            .store()
            .get_string_object(self.bucket(), &key)
            .map_err(|_| {
                FedsvcError::ServiceAccount(format!(
                    "this service does not have a valid financial account on the \
                     accounting service at '{}'",
                    accounting_service_uid
                ))
            })?;

        self.caches()
            .account_uid
            .put(accounting_service_uid.to_string(), account_uid.clone());

        Ok(account_uid)
    }

    /// Record the payout account UID for an accounting service. First
    /// writer wins; the canonical UID is returned either way.
    pub fn register_service_account_uid(
        &self,
        accounting_service_uid: &str,
        account_uid: &str,
    ) -> Result<String> {
        let key = format!("{}/account/{}", SERVICE_KEY, accounting_service_uid);
        let stored = self
            .store()
            .set_ins_string_object(self.bucket(), &key, account_uid)?;

        self.caches().account_uid.pop(accounting_service_uid);

        Ok(stored)
    }
}
