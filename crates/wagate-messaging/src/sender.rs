// SPDX-FileCopyrightText: 2026 Wagate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-attempt delivery of outbound jobs.

use std::collections::HashMap;
use std::sync::Arc;

use wagate_core::{OutboundJob, WagateError};
use wagate_session::SessionStore;
use wagate_storage::queries::templates;
use wagate_storage::Database;
use wagate_transport::{MessageReceipt, OutboundContent};

/// Substitute `{{key}}` placeholders. Placeholders without a matching
/// variable are left verbatim so a half-filled render is visible downstream.
pub fn render_template(content: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = content.to_string();
    for (key, value) in variables {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

/// Resolves live connections and performs one delivery attempt per job.
pub struct MessageSender {
    db: Database,
    store: Arc<SessionStore>,
}

impl MessageSender {
    pub fn new(db: Database, store: Arc<SessionStore>) -> Self {
        Self { db, store }
    }

    /// One delivery attempt. Fails when the session has no live CONNECTED
    /// handle; the worker's retry budget absorbs transient disconnects.
    pub async fn deliver(&self, job: &OutboundJob) -> Result<MessageReceipt, WagateError> {
        let session_id = job.session_id();
        let handle = self.store.connected_handle(session_id).ok_or_else(|| {
            WagateError::Transport {
                message: format!("session {session_id} is not connected"),
                source: None,
            }
        })?;

        match job {
            OutboundJob::Text { to, message, .. } => {
                handle
                    .send(
                        to,
                        OutboundContent::Text {
                            text: message.clone(),
                        },
                    )
                    .await
            }
            OutboundJob::Media {
                to,
                media_type,
                media_url,
                caption,
                ..
            } => {
                handle
                    .send(
                        to,
                        OutboundContent::MediaUrl {
                            media_type: *media_type,
                            url: media_url.clone(),
                            caption: caption.clone(),
                        },
                    )
                    .await
            }
            OutboundJob::File {
                to,
                path,
                mime_type,
                file_name,
                caption,
                ..
            } => {
                let bytes = tokio::fs::read(path).await.map_err(|e| {
                    WagateError::Internal(format!("cannot read upload blob {path}: {e}"))
                })?;
                let content = content_for_file(bytes, mime_type, file_name, caption.clone());
                handle.send(to, content).await
            }
            OutboundJob::Template {
                to,
                template_name,
                variables,
                ..
            } => {
                let template = templates::get_by_name(&self.db, template_name)
                    .await?
                    .ok_or_else(|| WagateError::NotFound {
                        resource: "template",
                        id: template_name.clone(),
                    })?;
                let text = render_template(&template.content, variables);
                handle.send(to, OutboundContent::Text { text }).await
            }
        }
    }

    /// Preview text recorded in the message log for a job.
    pub fn preview(job: &OutboundJob) -> Option<String> {
        match job {
            OutboundJob::Text { message, .. } => Some(message.clone()),
            OutboundJob::Media { caption, .. } | OutboundJob::File { caption, .. } => {
                caption.clone()
            }
            OutboundJob::Template { template_name, .. } => Some(format!("[{template_name}]")),
        }
    }

    pub fn recipient(job: &OutboundJob) -> &str {
        match job {
            OutboundJob::Text { to, .. }
            | OutboundJob::Media { to, .. }
            | OutboundJob::File { to, .. }
            | OutboundJob::Template { to, .. } => to,
        }
    }
}

/// Pick the protocol content shape for an uploaded blob from its MIME type.
fn content_for_file(
    bytes: Vec<u8>,
    mime_type: &str,
    file_name: &str,
    caption: Option<String>,
) -> OutboundContent {
    if mime_type.starts_with("image/") {
        OutboundContent::Image {
            bytes,
            mime_type: mime_type.to_string(),
            caption,
        }
    } else if mime_type.starts_with("video/") {
        OutboundContent::Video {
            bytes,
            mime_type: mime_type.to_string(),
            caption,
        }
    } else if mime_type.starts_with("audio/") {
        OutboundContent::Audio {
            bytes,
            mime_type: mime_type.to_string(),
        }
    } else {
        OutboundContent::Document {
            bytes,
            mime_type: mime_type.to_string(),
            file_name: file_name.to_string(),
            caption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::tempdir;
    use wagate_core::SessionStatus;
    use wagate_session::LiveSession;
    use wagate_transport::TransportHandle;

    #[derive(Default)]
    struct RecordingHandle {
        sent: Mutex<Vec<(String, OutboundContent)>>,
    }

    #[async_trait]
    impl TransportHandle for RecordingHandle {
        async fn send(
            &self,
            to: &str,
            content: OutboundContent,
        ) -> Result<MessageReceipt, WagateError> {
            self.sent.lock().unwrap().push((to.to_string(), content));
            Ok(MessageReceipt {
                message_id: "wire-1".into(),
            })
        }

        async fn logout(&self) -> Result<(), WagateError> {
            Ok(())
        }

        async fn close(&self) {}
    }

    async fn setup() -> (Database, Arc<SessionStore>, Arc<RecordingHandle>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        let store = Arc::new(SessionStore::new());
        let handle = Arc::new(RecordingHandle::default());
        store.insert(
            "s1",
            LiveSession {
                handle: handle.clone(),
                status: SessionStatus::Connecting,
                webhook_url: None,
                qr: None,
                identity: None,
                reconnect_attempts: 0,
            },
        );
        store.set_connected("s1", "s1@test".into());
        (db, store, handle, dir)
    }

    #[test]
    fn render_substitutes_all_occurrences() {
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Ada".to_string());
        vars.insert("code".to_string(), "1234".to_string());

        let rendered = render_template("Hi {{name}}! {{name}}, your code is {{code}}.", &vars);
        assert_eq!(rendered, "Hi Ada! Ada, your code is 1234.");
    }

    #[test]
    fn render_keeps_unmatched_placeholders() {
        let vars = HashMap::new();
        assert_eq!(render_template("Hi {{name}}", &vars), "Hi {{name}}");
    }

    #[tokio::test]
    async fn delivers_text_to_connected_session() {
        let (db, store, handle, _dir) = setup().await;
        let sender = MessageSender::new(db.clone(), store);

        let receipt = sender
            .deliver(&OutboundJob::Text {
                session_id: "s1".into(),
                to: "123@c.us".into(),
                message: "hello".into(),
            })
            .await
            .unwrap();
        assert_eq!(receipt.message_id, "wire-1");

        let sent = handle.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "123@c.us");
        assert!(matches!(&sent[0].1, OutboundContent::Text { text } if text == "hello"));
        drop(sent);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn rejects_session_that_is_not_connected() {
        let (db, store, _handle, _dir) = setup().await;
        store.set_status("s1", SessionStatus::Disconnected);
        let sender = MessageSender::new(db.clone(), store);

        let err = sender
            .deliver(&OutboundJob::Text {
                session_id: "s1".into(),
                to: "123@c.us".into(),
                message: "hello".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WagateError::Transport { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn template_job_renders_before_sending() {
        let (db, store, handle, _dir) = setup().await;
        templates::create(&db, "welcome", "Welcome {{name}}!", Some("en"), None)
            .await
            .unwrap();
        let sender = MessageSender::new(db.clone(), store);

        let mut variables = HashMap::new();
        variables.insert("name".to_string(), "Ada".to_string());
        sender
            .deliver(&OutboundJob::Template {
                session_id: "s1".into(),
                to: "123@c.us".into(),
                template_name: "welcome".into(),
                variables,
            })
            .await
            .unwrap();

        let sent = handle.sent.lock().unwrap();
        assert!(matches!(&sent[0].1, OutboundContent::Text { text } if text == "Welcome Ada!"));
        drop(sent);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_template_is_not_found() {
        let (db, store, _handle, _dir) = setup().await;
        let sender = MessageSender::new(db.clone(), store);

        let err = sender
            .deliver(&OutboundJob::Template {
                session_id: "s1".into(),
                to: "123@c.us".into(),
                template_name: "missing".into(),
                variables: HashMap::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WagateError::NotFound { .. }));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn file_job_shape_follows_mime_type() {
        let (db, store, handle, dir) = setup().await;
        let blob = dir.path().join("photo.jpg");
        tokio::fs::write(&blob, b"jpeg-bytes").await.unwrap();
        let sender = MessageSender::new(db.clone(), store);

        sender
            .deliver(&OutboundJob::File {
                session_id: "s1".into(),
                to: "123@c.us".into(),
                path: blob.to_string_lossy().into_owned(),
                mime_type: "image/jpeg".into(),
                file_name: "photo.jpg".into(),
                caption: Some("look".into()),
            })
            .await
            .unwrap();

        let sent = handle.sent.lock().unwrap();
        match &sent[0].1 {
            OutboundContent::Image {
                bytes,
                mime_type,
                caption,
            } => {
                assert_eq!(bytes, b"jpeg-bytes");
                assert_eq!(mime_type, "image/jpeg");
                assert_eq!(caption.as_deref(), Some("look"));
            }
            other => panic!("expected image content, got {other:?}"),
        }
        drop(sent);

        db.close().await.unwrap();
    }

    #[test]
    fn unknown_mime_falls_back_to_document() {
        let content = content_for_file(b"bytes".to_vec(), "application/pdf", "doc.pdf", None);
        assert!(matches!(content, OutboundContent::Document { .. }));

        let content = content_for_file(b"bytes".to_vec(), "audio/ogg", "note.ogg", None);
        assert!(matches!(content, OutboundContent::Audio { .. }));
    }
}
