//! # Stream Filter
//!
//! Replaces every SOPS-encrypted document in a stream with its plaintext, in place.
//!
//! Documents without a top-level `sops` field are passed through untouched. Candidates have
//! the pipeline-injected annotations removed (they were not present when the document was
//! encrypted), are serialized, decrypted and re-parsed. The first failure aborts the whole run.

use crate::config::{FilterConfig, FunctionConfig};
use crate::constants::PIPELINE_INJECTED_ANNOTATIONS;
use crate::document::{DocumentError, DocumentFormat, ResourceNode};
use crate::sops::{decrypt_document, is_sops_document, ConfigError, DecryptError, FailureKind};
use thiserror::Error;
use tracing::{debug, info, info_span};

/// Errors that abort a filter run
#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("failed to decrypt document {index} ({document}): {source}")]
    Document {
        index: usize,
        document: String,
        #[source]
        source: DecryptError,
    },

    #[error("document {index} ({document}) could not be converted: {source}")]
    Node {
        index: usize,
        document: String,
        #[source]
        source: DocumentError,
    },
}

impl FilterError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FilterError::Configuration(e) => e.kind(),
            FilterError::Document { source, .. } => source.kind(),
            FilterError::Node { .. } => FailureKind::FormatError,
        }
    }
}

/// Decrypting stage over a document stream
#[derive(Debug)]
pub struct StreamFilter {
    config: FilterConfig,
}

impl StreamFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Resolve identities and MAC policy before any document is looked at
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::Configuration`] for an empty or malformed configuration.
    pub fn from_function_config(config: &FunctionConfig) -> Result<Self, FilterError> {
        Ok(Self::new(config.resolve()?))
    }

    /// Process the stream, preserving order and count
    ///
    /// # Errors
    ///
    /// Fails fast on the first document that cannot be decrypted; no partial output is returned.
    pub fn process(&self, documents: Vec<ResourceNode>) -> Result<Vec<ResourceNode>, FilterError> {
        info!(
            documents = documents.len(),
            identities = self.config.identities.len(),
            "Decrypting document stream"
        );

        let mut output = Vec::with_capacity(documents.len());
        let mut decrypted = 0usize;
        for (index, node) in documents.into_iter().enumerate() {
            if !is_sops_document(node.value()) {
                output.push(node);
                continue;
            }
            output.push(self.decrypt_node(index, node)?);
            decrypted += 1;
        }

        info!(decrypted, "Document stream decrypted");
        Ok(output)
    }

    fn decrypt_node(&self, index: usize, mut node: ResourceNode) -> Result<ResourceNode, FilterError> {
        let document = node.display_id();
        let _span = info_span!("decrypt_document", index, document = %document).entered();

        for annotation in PIPELINE_INJECTED_ANNOTATIONS {
            if node.clear_annotation(annotation) {
                debug!(annotation, "Removed pipeline annotation");
            }
        }

        let node_error = |source| FilterError::Node {
            index,
            document: document.clone(),
            source,
        };

        let wire = node.to_wire(DocumentFormat::Yaml).map_err(node_error)?;
        let plaintext = decrypt_document(
            wire.as_bytes(),
            DocumentFormat::Yaml,
            &self.config.identities,
            self.config.mac_policy,
        )
        .map_err(|source| FilterError::Document {
            index,
            document: document.clone(),
            source,
        })?;

        let text = String::from_utf8_lossy(&plaintext);
        let decrypted = ResourceNode::from_wire(&text, DocumentFormat::Yaml).map_err(node_error)?;
        debug!("Document decrypted");
        Ok(decrypted)
    }
}
