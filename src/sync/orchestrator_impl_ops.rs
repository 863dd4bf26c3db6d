impl Orchestrator {
    async fn write_local_from_cloud(&self, item: &CloudItem) -> Result<(), SyncError> {
        let target = paths::url_for(&self.local_root, &item.file_name)?;
        let source = item.file_url.clone();
        let modified = item.last_modification_date;
        run_blocking(move || copy_coordinated(&source, &target, modified)).await?;
        self.mark_reload();
        Ok(())
    }

    async fn remove_local(&self, item: &CloudItem) -> Result<(), SyncError> {
        let target = paths::url_for(&self.local_root, &item.file_name)?;
        let removed = run_blocking(move || {
            // Already gone counts as success; the removal's purpose is met.
            if !target.exists() {
                return Ok(false);
            }
            let _write = coordinated::write(&target)?;
            std::fs::remove_file(&target)?;
            Ok(true)
        })
        .await?;
        if removed {
            self.mark_reload();
        }
        Ok(())
    }

    async fn write_cloud_from_local(&self, item: &LocalItem) -> Result<(), SyncError> {
        let container = self.platform.container_url().await?;
        let target = paths::url_for(&container, &item.file_name)?;

        let versions = self.platform.unresolved_versions(&target).await?;
        if !versions.is_empty() {
            return self.settle_versions(&target, versions).await;
        }

        let source = item.file_url.clone();
        let modified = item.last_modification_date;
        run_blocking(move || copy_coordinated(&source, &target, modified)).await
    }

    async fn trash_cloud(&self, item: &LocalItem) -> Result<(), SyncError> {
        let container = self.platform.container_url().await?;
        let target = paths::url_for(&container, &item.file_name)?;
        let trash = paths::trash_url_for(&container, &item.file_name)?;
        run_blocking(move || {
            if !target.exists() {
                return Ok(());
            }
            if let Some(trash_dir) = trash.parent() {
                std::fs::create_dir_all(trash_dir)?;
            }
            // The platform trash rejects name collisions and does not let
            // the caller pick the trashed name; purge the older tombstone.
            if trash.exists() {
                std::fs::remove_file(&trash)?;
            }
            let _write = coordinated::write(&target)?;
            std::fs::rename(&target, &trash)
        })
        .await
    }

    async fn resolve_version_conflict(&self, url: &Path) -> Result<(), SyncError> {
        let versions = self.platform.unresolved_versions(url).await?;
        self.settle_versions(url, versions).await
    }

    async fn settle_versions(
        &self,
        url: &Path,
        versions: Vec<FileVersion>,
    ) -> Result<(), SyncError> {
        let target = url.to_path_buf();
        let settled =
            run_blocking(move || conflict::settle_version_conflict(&target, &versions)).await?;
        if let Some(settlement) = settled {
            match &settlement.preserved_as {
                Some(preserved) => eprintln!(
                    "[marksyncd] version conflict settled: {} (loser kept as {})",
                    url.display(),
                    preserved.display()
                ),
                None => eprintln!(
                    "[marksyncd] version conflict settled elsewhere: {}",
                    url.display()
                ),
            }
            self.platform.mark_versions_resolved(url).await?;
            self.mark_reload();
        }
        Ok(())
    }

    async fn resolve_initial_collision(&self, item: &LocalItem) -> Result<(), SyncError> {
        let source = item.file_url.clone();
        let device = self.device_name.clone();
        let copy = run_blocking(move || conflict::preserve_local_history(&source, &device)).await?;
        eprintln!("[marksyncd] preserved local history as {}", copy.display());
        self.mark_reload();
        Ok(())
    }
}
