//! Filesystem contract for one remote session.
//!
//! The store's primitives are weaker than what the host expects: `write`
//! always creates-or-overwrites and `move` never overwrites. The adapter
//! emulates the host semantics with a `stat` check before mutating. The check
//! and the mutation are separate requests, so a concurrent remote change in
//! between is not detected; the store offers no conditional write.

use std::sync::Arc;

use bytes::Bytes;
use repl_bridge_core::{
    ChangeEmitter, ChangeEvent, DeleteOptions, DirEntry, FileStat, FileType, FsError,
    RenameOptions, ResourceId, WatchHandle, WriteOptions,
    error::{self, FsErrorKind},
};
use repl_bridge_transport::{
    ChannelSession, ChannelStatus, Command, Response, RetryingRequestExecutor, Service, Transport,
    protocol::{StatResult, WireFileType},
};

const fn file_type(wire: WireFileType) -> FileType {
    match wire {
        WireFileType::Directory => FileType::Directory,
        WireFileType::File | WireFileType::Other => FileType::File,
    }
}

/// Filesystem operations against one session's file service.
pub struct FilesystemAdapter {
    session_id: String,
    executor: RetryingRequestExecutor,
    events: ChangeEmitter,
}

impl FilesystemAdapter {
    /// Open the file service of `transport` for `session_id`.
    #[must_use]
    pub fn open(session_id: impl Into<String>, transport: &dyn Transport, events: ChangeEmitter) -> Self {
        let session_id = session_id.into();
        let session = ChannelSession::open(session_id.clone(), transport, Service::Files);
        Self::new(session_id, Arc::new(session), events)
    }

    /// Build over an existing channel session.
    #[must_use]
    pub const fn new(session_id: String, session: Arc<ChannelSession>, events: ChangeEmitter) -> Self {
        Self {
            session_id,
            executor: RetryingRequestExecutor::new(session),
            events,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Status of the file channel.
    #[must_use]
    pub fn status(&self) -> ChannelStatus {
        self.executor.status()
    }

    /// Resolve once the file channel is permanently closed.
    pub async fn wait_closed(&self) {
        self.executor.session().wait_closed().await;
    }

    /// Close the file channel. Pending and later operations fail `Unavailable`.
    pub fn close(&self) {
        self.executor.session().close();
    }

    /// Changes are pushed after every local operation; nothing to register.
    #[must_use]
    pub const fn watch(&self, _resource: &ResourceId) -> WatchHandle {
        WatchHandle
    }

    /// Metadata for `resource`.
    ///
    /// # Errors
    /// `NotFound` when the entry does not exist, or any mapped remote error.
    pub async fn stat(&self, resource: &ResourceId) -> Result<FileStat, FsError> {
        let response = self
            .request(Command::Stat { path: remote(resource) }, resource)
            .await?;
        let stat = response
            .stat_res
            .ok_or_else(|| FsError::invalid_response("expected stat result"))?;
        if !stat.exists {
            return Err(FsError::not_found(resource));
        }
        Ok(FileStat::from_remote(
            file_type(stat.file_type),
            stat.size,
            stat.mod_time,
        ))
    }

    /// List the entries of a directory, in the order the store returns them.
    ///
    /// # Errors
    /// Any mapped remote error, or `InvalidResponse` if the listing is missing.
    pub async fn read_directory(&self, resource: &ResourceId) -> Result<Vec<DirEntry>, FsError> {
        let response = self
            .request(Command::Readdir { path: remote(resource) }, resource)
            .await?;
        let files = response
            .files
            .and_then(|list| list.files)
            .ok_or_else(|| FsError::invalid_response("expected files.files"))?;
        Ok(files
            .into_iter()
            .map(|entry| (entry.path, file_type(entry.file_type)))
            .collect())
    }

    /// Contents of a file.
    ///
    /// # Errors
    /// Any mapped remote error, or `InvalidResponse` if no file came back.
    pub async fn read_file(&self, resource: &ResourceId) -> Result<Bytes, FsError> {
        let response = self
            .request(Command::Read { path: remote(resource) }, resource)
            .await?;
        let file = response
            .file
            .ok_or_else(|| FsError::invalid_response("expected file"))?;
        Ok(file.content)
    }

    /// Write `content`, honoring `create`/`overwrite`.
    ///
    /// # Errors
    /// `IsADirectory` if the target is a directory, `NotFound` if it is
    /// missing and `create` is false, `AlreadyExists` if it exists and
    /// `overwrite` is false. No write is issued in those cases.
    pub async fn write_file(
        &self,
        resource: &ResourceId,
        content: Bytes,
        options: WriteOptions,
    ) -> Result<(), FsError> {
        match self.stat_if_exists(resource).await? {
            Some(stat) if stat.file_type == WireFileType::Directory => {
                return Err(FsError::is_a_directory(resource));
            }
            None if !options.create => return Err(FsError::not_found(resource)),
            Some(_) if !options.overwrite => return Err(FsError::already_exists(resource)),
            _ => {}
        }

        self.request(
            Command::Write {
                path: remote(resource),
                content,
            },
            resource,
        )
        .await?;

        let mut batch = Vec::with_capacity(3);
        if options.create {
            batch.push(ChangeEvent::created(resource.clone()));
            batch.push(ChangeEvent::changed(resource.parent()));
        }
        batch.push(ChangeEvent::changed(resource.clone()));
        self.events.fire(batch);
        Ok(())
    }

    /// Create a directory.
    ///
    /// # Errors
    /// Any mapped remote error (typically `AlreadyExists`).
    pub async fn create_directory(&self, resource: &ResourceId) -> Result<(), FsError> {
        self.request(Command::Mkdir { path: remote(resource) }, resource)
            .await?;
        self.events.fire(vec![
            ChangeEvent::created(resource.clone()),
            ChangeEvent::changed(resource.parent()),
        ]);
        Ok(())
    }

    /// Remove a file or directory.
    ///
    /// `options.recursive` is not forwarded; the store decides how `remove`
    /// treats directory contents.
    ///
    /// # Errors
    /// Any mapped remote error.
    pub async fn delete(&self, resource: &ResourceId, options: DeleteOptions) -> Result<(), FsError> {
        tracing::trace!(resource = %resource, recursive = options.recursive, "delete");
        self.request(Command::Remove { path: remote(resource) }, resource)
            .await?;
        self.events.fire(vec![
            ChangeEvent::deleted(resource.clone()),
            ChangeEvent::changed(resource.parent()),
        ]);
        Ok(())
    }

    /// Move `old` to `new`.
    ///
    /// A no-op when both name the same remote path. An existing target is
    /// removed first when `overwrite` is set, since the remote `move` never
    /// replaces.
    ///
    /// # Errors
    /// `AlreadyExists` if the target exists without `overwrite`, `Unknown`
    /// when the paths belong to different sessions, or any mapped remote error.
    pub async fn rename(
        &self,
        old: &ResourceId,
        new: &ResourceId,
        options: RenameOptions,
    ) -> Result<(), FsError> {
        if old.session_id() != new.session_id() {
            return Err(FsError::Unknown(format!(
                "cannot move {old} to {new}: different sessions"
            )));
        }
        if old.to_remote() == new.to_remote() {
            return Ok(());
        }

        if self.stat_if_exists(new).await?.is_some() {
            if !options.overwrite {
                return Err(FsError::already_exists(new));
            }
            self.delete(new, DeleteOptions { recursive: true }).await?;
        }

        self.request(
            Command::Move {
                old_path: remote(old),
                new_path: remote(new),
            },
            old,
        )
        .await?;

        self.events.fire(vec![
            ChangeEvent::deleted(old.clone()),
            ChangeEvent::created(new.clone()),
            ChangeEvent::changed(old.parent()),
            ChangeEvent::changed(new.parent()),
        ]);
        Ok(())
    }

    /// Execute and map the application error, if any.
    async fn request(&self, command: Command, resource: &ResourceId) -> Result<Response, FsError> {
        let response = self.executor.execute(command).await?;
        error::check(response.error_message(), resource)?;
        Ok(response)
    }

    /// Existence check used before mutations. A "no such file" error counts
    /// as absent.
    async fn stat_if_exists(&self, resource: &ResourceId) -> Result<Option<StatResult>, FsError> {
        let response = self
            .executor
            .execute(Command::Stat { path: remote(resource) })
            .await?;
        if let Some(message) = response.error_message() {
            if error::classify(message) == Some(FsErrorKind::NotFound) {
                return Ok(None);
            }
            error::check(Some(message), resource)?;
        }
        let stat = response
            .stat_res
            .ok_or_else(|| FsError::invalid_response("expected stat result"))?;
        Ok(stat.exists.then_some(stat))
    }
}

fn remote(resource: &ResourceId) -> String {
    resource.to_remote().into_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        collections::BTreeMap,
        sync::{Arc, Mutex},
    };

    use super::*;
    use repl_bridge_core::ChangeKind;
    use repl_bridge_transport::{
        mock::{MockChannel, MockTransport},
        protocol::FileEntry,
    };

    /// In-memory remote store keyed by remote path.
    #[derive(Default)]
    pub(crate) struct FakeStore {
        entries: Mutex<BTreeMap<String, Option<Bytes>>>,
    }

    impl FakeStore {
        pub(crate) fn new() -> Arc<Self> {
            let store = Arc::new(Self::default());
            store.mkdir("./");
            store
        }

        pub(crate) fn file(&self, path: &str, content: &'static [u8]) {
            self.entries
                .lock()
                .unwrap()
                .insert(path.to_string(), Some(Bytes::from_static(content)));
        }

        pub(crate) fn mkdir(&self, path: &str) {
            self.entries.lock().unwrap().insert(path.to_string(), None);
        }

        pub(crate) fn get(&self, path: &str) -> Option<Option<Bytes>> {
            self.entries.lock().unwrap().get(path).cloned()
        }

        pub(crate) fn answer(&self, command: &Command) -> Response {
            let mut entries = self.entries.lock().unwrap();
            match command {
                Command::Stat { path } => match entries.get(path) {
                    Some(None) => Response::stat(WireFileType::Directory, 0, 100),
                    Some(Some(content)) => {
                        Response::stat(WireFileType::File, content.len() as u64, 100)
                    }
                    None => Response::stat_missing(),
                },
                Command::Read { path } => match entries.get(path) {
                    Some(Some(content)) => Response::content(path.clone(), content.clone()),
                    Some(None) => Response::error(format!("read {path}: is a directory")),
                    None => Response::error(format!("open {path}: no such file or directory")),
                },
                Command::Write { path, content } => {
                    entries.insert(path.clone(), Some(content.clone()));
                    Response::ok()
                }
                Command::Mkdir { path } => {
                    if entries.contains_key(path) {
                        Response::error(format!("mkdir {path}: file exists"))
                    } else {
                        entries.insert(path.clone(), None);
                        Response::ok()
                    }
                }
                Command::Remove { path } => {
                    let prefix = format!("{path}/");
                    entries.retain(|p, _| p != path && !p.starts_with(&prefix));
                    Response::ok()
                }
                Command::Move { old_path, new_path } => match entries.remove(old_path) {
                    Some(entry) => {
                        entries.insert(new_path.clone(), entry);
                        Response::ok()
                    }
                    None => Response::error(format!("rename {old_path}: no such file or directory")),
                },
                Command::Readdir { path } => {
                    let prefix = if path.ends_with('/') {
                        path.clone()
                    } else {
                        format!("{path}/")
                    };
                    let files = entries
                        .iter()
                        .filter_map(|(p, entry)| {
                            let name = p.strip_prefix(&prefix)?;
                            (!name.is_empty() && !name.contains('/')).then(|| FileEntry {
                                path: name.to_string(),
                                file_type: if entry.is_none() {
                                    WireFileType::Directory
                                } else {
                                    WireFileType::File
                                },
                            })
                        })
                        .collect();
                    Response::listing(files)
                }
                Command::Input(_) | Command::ResizeTerm { .. } | Command::Output(_) => {
                    Response::error("unsupported")
                }
            }
        }
    }

    struct Fixture {
        adapter: FilesystemAdapter,
        channel: Arc<MockChannel>,
        store: Arc<FakeStore>,
        events: tokio::sync::broadcast::Receiver<repl_bridge_core::ChangeBatch>,
        _transport: Arc<MockTransport>,
    }

    fn fixture() -> Fixture {
        let transport = MockTransport::new();
        let emitter = ChangeEmitter::new();
        let events = emitter.subscribe();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), emitter);
        let store = FakeStore::new();
        let channel = {
            let store = Arc::clone(&store);
            MockChannel::new(move |command| store.answer(command))
        };
        transport.open(Service::Files, Arc::clone(&channel));
        Fixture {
            adapter,
            channel,
            store,
            events,
            _transport: transport,
        }
    }

    fn id(path: &str) -> ResourceId {
        ResourceId::new("s1", path)
    }

    fn names(commands: &[Command]) -> Vec<&'static str> {
        commands.iter().map(Command::name).collect()
    }

    #[tokio::test]
    async fn test_stat_root_of_fresh_session() {
        let transport = MockTransport::new();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new());
        let adapter = Arc::new(adapter);

        let pending = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move { adapter.stat(&ResourceId::root("s1")).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(adapter.status(), ChannelStatus::Connecting);

        let channel = MockChannel::new(|_| Response::stat(WireFileType::Directory, 0, 5));
        transport.open(Service::Files, Arc::clone(&channel));

        let stat = pending.await.unwrap().unwrap();
        assert_eq!(stat.kind, FileType::Directory);
        assert_eq!(stat.modified_at, 5000);
        assert_eq!(stat.created_at, stat.modified_at);
        assert_eq!(channel.requests(), vec![Command::Stat { path: "./".into() }]);
    }

    #[tokio::test]
    async fn test_stat_missing_is_not_found() {
        let f = fixture();
        let err = f.adapter.stat(&id("/nope")).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_stat_without_payload_is_invalid_response() {
        let transport = MockTransport::new();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new());
        transport.open(Service::Files, MockChannel::new(|_| Response::ok()));
        let err = adapter.stat(&id("/a")).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_read_directory_maps_types_in_order() {
        let transport = MockTransport::new();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new());
        transport.open(
            Service::Files,
            MockChannel::new(|_| {
                Response::listing(vec![
                    FileEntry {
                        path: "a.txt".into(),
                        file_type: WireFileType::File,
                    },
                    FileEntry {
                        path: "sub".into(),
                        file_type: WireFileType::Directory,
                    },
                    FileEntry {
                        path: "link".into(),
                        file_type: WireFileType::Other,
                    },
                ])
            }),
        );

        let entries = adapter.read_directory(&ResourceId::root("s1")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("a.txt".to_string(), FileType::File),
                ("sub".to_string(), FileType::Directory),
                ("link".to_string(), FileType::File),
            ]
        );
    }

    #[tokio::test]
    async fn test_read_directory_requires_listing() {
        let transport = MockTransport::new();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new());
        transport.open(Service::Files, MockChannel::new(|_| Response::ok()));
        let err = adapter.read_directory(&id("/")).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn test_read_file_maps_errors() {
        let f = fixture();
        f.store.file("./a.txt", b"hello");
        f.store.mkdir("./dir");

        assert_eq!(&f.adapter.read_file(&id("/a.txt")).await.unwrap()[..], b"hello");
        let missing = f.adapter.read_file(&id("/b.txt")).await.unwrap_err();
        assert_eq!(missing, FsError::NotFound("replit://s1/b.txt".into()));
        let dir = f.adapter.read_file(&id("/dir")).await.unwrap_err();
        assert_eq!(dir.kind(), FsErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn test_write_without_create_on_missing_is_not_found() {
        let f = fixture();
        let err = f
            .adapter
            .write_file(&id("/p"), Bytes::from_static(b"c"), WriteOptions::new(false, true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::NotFound);
        assert_eq!(names(&f.channel.requests()), vec!["stat"]);
    }

    #[tokio::test]
    async fn test_write_without_overwrite_on_existing_is_already_exists() {
        let f = fixture();
        f.store.file("./p", b"old");
        let err = f
            .adapter
            .write_file(&id("/p"), Bytes::from_static(b"new"), WriteOptions::new(true, false))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::AlreadyExists);
        assert_eq!(names(&f.channel.requests()), vec!["stat"]);
        assert_eq!(f.store.get("./p"), Some(Some(Bytes::from_static(b"old"))));
    }

    #[tokio::test]
    async fn test_write_to_directory_is_rejected() {
        let f = fixture();
        f.store.mkdir("./dir");
        let err = f
            .adapter
            .write_file(&id("/dir"), Bytes::new(), WriteOptions::new(true, true))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::IsADirectory);
    }

    #[tokio::test]
    async fn test_write_new_file_emits_created() {
        let mut f = fixture();
        f.adapter
            .write_file(&id("/dir/new.txt"), Bytes::from_static(b"x"), WriteOptions::new(true, false))
            .await
            .unwrap();

        assert_eq!(names(&f.channel.requests()), vec!["stat", "write"]);
        let batch = f.events.recv().await.unwrap();
        let kinds: Vec<_> = batch.iter().map(|e| (e.kind, e.resource.path().to_string())).collect();
        assert_eq!(
            kinds,
            vec![
                (ChangeKind::Created, "/dir/new.txt".to_string()),
                (ChangeKind::Changed, "/dir".to_string()),
                (ChangeKind::Changed, "/dir/new.txt".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_with_create_emits_created_even_when_present() {
        let mut f = fixture();
        f.store.file("./a", b"1");
        f.adapter
            .write_file(&id("/a"), Bytes::from_static(b"2"), WriteOptions::new(true, true))
            .await
            .unwrap();
        let batch = f.events.recv().await.unwrap();
        assert_eq!(
            batch,
            vec![
                ChangeEvent::created(id("/a")),
                ChangeEvent::changed(ResourceId::root("s1")),
                ChangeEvent::changed(id("/a")),
            ]
        );
        assert_eq!(f.store.get("./a"), Some(Some(Bytes::from_static(b"2"))));
    }

    #[tokio::test]
    async fn test_overwrite_without_create_emits_changed_only() {
        let mut f = fixture();
        f.store.file("./a", b"1");
        f.adapter
            .write_file(&id("/a"), Bytes::from_static(b"2"), WriteOptions::new(false, true))
            .await
            .unwrap();
        let batch = f.events.recv().await.unwrap();
        assert_eq!(batch, vec![ChangeEvent::changed(id("/a"))]);
    }

    #[tokio::test]
    async fn test_create_directory_conflict() {
        let mut f = fixture();
        f.adapter.create_directory(&id("/d")).await.unwrap();
        let batch = f.events.recv().await.unwrap();
        assert_eq!(batch[0], ChangeEvent::created(id("/d")));
        assert_eq!(batch[1], ChangeEvent::changed(ResourceId::root("s1")));

        let err = f.adapter.create_directory(&id("/d")).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::AlreadyExists);
    }

    #[tokio::test]
    async fn test_delete_does_not_forward_recursive() {
        let mut f = fixture();
        f.store.file("./a", b"1");
        f.adapter
            .delete(&id("/a"), DeleteOptions { recursive: false })
            .await
            .unwrap();
        assert_eq!(f.channel.requests(), vec![Command::Remove { path: "./a".into() }]);
        let batch = f.events.recv().await.unwrap();
        assert_eq!(batch[0], ChangeEvent::deleted(id("/a")));
    }

    #[tokio::test]
    async fn test_rename_same_path_issues_nothing() {
        let f = fixture();
        f.adapter
            .rename(&id("/a"), &id("/a/"), RenameOptions { overwrite: false })
            .await
            .unwrap();
        assert!(f.channel.requests().is_empty());
    }

    #[tokio::test]
    async fn test_rename_existing_target_without_overwrite() {
        let f = fixture();
        f.store.file("./a", b"1");
        f.store.file("./b", b"2");
        let err = f
            .adapter
            .rename(&id("/a"), &id("/b"), RenameOptions { overwrite: false })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::AlreadyExists);
        assert_eq!(names(&f.channel.requests()), vec!["stat"]);
    }

    #[tokio::test]
    async fn test_rename_overwrite_removes_before_move() {
        let f = fixture();
        f.store.file("./a", b"1");
        f.store.file("./b", b"2");
        f.adapter
            .rename(&id("/a"), &id("/b"), RenameOptions { overwrite: true })
            .await
            .unwrap();

        assert_eq!(names(&f.channel.requests()), vec!["stat", "remove", "move"]);
        assert_eq!(f.store.get("./b"), Some(Some(Bytes::from_static(b"1"))));
        assert_eq!(f.store.get("./a"), None);
    }

    #[tokio::test]
    async fn test_rename_emits_both_sides() {
        let mut f = fixture();
        f.store.mkdir("./x");
        f.store.file("./x/a", b"1");
        f.adapter
            .rename(&id("/x/a"), &id("/b"), RenameOptions::default())
            .await
            .unwrap();
        let batch = f.events.recv().await.unwrap();
        assert_eq!(
            batch,
            vec![
                ChangeEvent::deleted(id("/x/a")),
                ChangeEvent::created(id("/b")),
                ChangeEvent::changed(id("/x")),
                ChangeEvent::changed(ResourceId::root("s1")),
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_across_sessions_rejected() {
        let f = fixture();
        let err = f
            .adapter
            .rename(&id("/a"), &ResourceId::new("s2", "/a"), RenameOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::Unknown);
        assert!(f.channel.requests().is_empty());
    }

    #[tokio::test]
    async fn test_write_survives_reconnect() {
        let transport = MockTransport::new();
        let adapter = Arc::new(FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new()));
        let store = FakeStore::new();

        let dead = MockChannel::new(|_| Response::ok());
        dead.kill();
        transport.open(Service::Files, Arc::clone(&dead));

        let task = {
            let adapter = Arc::clone(&adapter);
            tokio::spawn(async move {
                adapter
                    .write_file(&id("/f"), Bytes::from_static(b"v"), WriteOptions::new(true, true))
                    .await
            })
        };
        while dead.requests().is_empty() {
            tokio::task::yield_now().await;
        }

        let live = {
            let store = Arc::clone(&store);
            MockChannel::new(move |command| store.answer(command))
        };
        transport.close(Service::Files, true);
        transport.open(Service::Files, Arc::clone(&live));

        task.await.unwrap().unwrap();
        assert_eq!(names(&dead.requests()), vec!["stat"]);
        assert_eq!(names(&live.requests()), vec!["stat", "write"]);
        assert_eq!(store.get("./f"), Some(Some(Bytes::from_static(b"v"))));
    }

    #[tokio::test]
    async fn test_unknown_error_propagates() {
        let transport = MockTransport::new();
        let adapter = FilesystemAdapter::open("s1", transport.as_ref(), ChangeEmitter::new());
        transport.open(Service::Files, MockChannel::new(|_| Response::error("quota exceeded")));
        let err = adapter.create_directory(&id("/d")).await.unwrap_err();
        assert_eq!(err, FsError::Unknown("quota exceeded".into()));
    }

    #[tokio::test]
    async fn test_closed_adapter_is_unavailable() {
        let f = fixture();
        f.adapter.close();
        f.adapter.wait_closed().await;
        let err = f.adapter.stat(&id("/")).await.unwrap_err();
        assert_eq!(err.kind(), FsErrorKind::Unavailable);
    }
}
