//! Knowledge Base Loader
//!
//! Loads regulation clauses from YAML/JSON files and indexes them for
//! retrieval. Files are processed in name order so repeated loads produce
//! the same index.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embeddings::TextEmbedder;
use crate::index::{RegulationClause, SimilarityIndex};
use crate::RagError;

const EMBED_BATCH: usize = 64;

/// Knowledge base file format
#[derive(Debug, Serialize, Deserialize)]
pub struct KnowledgeFile {
    /// Version for format compatibility
    #[serde(default)]
    pub version: Option<String>,
    /// Clauses of one or more normative documents
    pub documents: Vec<RegulationClause>,
}

/// Knowledge loader for populating a similarity index
pub struct KnowledgeLoader;

impl KnowledgeLoader {
    /// Load every `.yaml`, `.yml` and `.json` file in `knowledge_dir`
    ///
    /// A file that fails to parse is logged and skipped. Returns the number
    /// of clauses indexed.
    pub async fn load_directory(
        knowledge_dir: &Path,
        index: &dyn SimilarityIndex,
        embedder: &dyn TextEmbedder,
    ) -> Result<usize, RagError> {
        if !knowledge_dir.exists() {
            tracing::warn!(
                path = %knowledge_dir.display(),
                "Knowledge directory does not exist"
            );
            return Ok(0);
        }

        let mut total_count = 0;

        for path in Self::knowledge_files(knowledge_dir)? {
            match Self::load_file(&path, index, embedder).await {
                Ok(count) => {
                    tracing::info!(
                        file = %path.display(),
                        clauses = count,
                        "Loaded knowledge file"
                    );
                    total_count += count;
                },
                Err(e) => {
                    tracing::error!(
                        file = %path.display(),
                        error = %e,
                        "Failed to load knowledge file"
                    );
                },
            }
        }

        tracing::info!(
            directory = %knowledge_dir.display(),
            total_clauses = total_count,
            index = index.name(),
            "Knowledge base loading complete"
        );

        Ok(total_count)
    }

    fn knowledge_files(dir: &Path) -> Result<Vec<PathBuf>, RagError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| RagError::Index(format!("Failed to read directory: {}", e)))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| RagError::Index(format!("Failed to read entry: {}", e)))?;
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if matches!(extension, "yaml" | "yml" | "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Parse a knowledge file without indexing it
    pub fn parse_file(path: &Path) -> Result<KnowledgeFile, RagError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RagError::Index(format!("Failed to read file: {}", e)))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let knowledge: KnowledgeFile = match extension {
            "json" => serde_json::from_str(&content)
                .map_err(|e| RagError::Index(format!("JSON parse error: {}", e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| RagError::Index(format!("YAML parse error: {}", e)))?,
            _ => {
                return Err(RagError::Index(format!(
                    "Unsupported file type: {}",
                    extension
                )))
            },
        };

        for clause in &knowledge.documents {
            if clause.id.trim().is_empty() || clause.clause_text.trim().is_empty() {
                return Err(RagError::Index(format!(
                    "Clause without id or text in {}",
                    path.display()
                )));
            }
        }

        Ok(knowledge)
    }

    /// Load a single knowledge file
    pub async fn load_file(
        path: &Path,
        index: &dyn SimilarityIndex,
        embedder: &dyn TextEmbedder,
    ) -> Result<usize, RagError> {
        let knowledge = Self::parse_file(path)?;

        for chunk in knowledge.documents.chunks(EMBED_BATCH) {
            let texts: Vec<String> = chunk.iter().map(|c| c.embedding_text()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;
            index.upsert(chunk, &embeddings).await?;
        }

        Ok(knowledge.documents.len())
    }

    /// Create a sample knowledge file for reference
    pub fn create_sample_file(path: &Path) -> Result<(), RagError> {
        let sample = KnowledgeFile {
            version: Some("1.0".to_string()),
            documents: vec![
                RegulationClause {
                    id: "sp70-9.18.3".to_string(),
                    document_title: "Несущие и ограждающие конструкции".to_string(),
                    document_number: "СП 70.13330.2012".to_string(),
                    clause_number: "9.18.3".to_string(),
                    clause_text: "Трещины в несущих каменных стенах подлежат обследованию; \
                                  дальнейшее возведение конструкций до установления причин \
                                  трещинообразования не допускается."
                        .to_string(),
                    keywords: vec!["трещина".to_string(), "несущая стена".to_string()],
                },
                RegulationClause {
                    id: "sp48-7.1.3".to_string(),
                    document_title: "Организация строительства".to_string(),
                    document_number: "СП 48.13330.2019".to_string(),
                    clause_number: "7.1.3".to_string(),
                    clause_text: "Строительный контроль включает проверку выполнения работ \
                                  на соответствие проектной документации и требованиям \
                                  нормативных документов."
                        .to_string(),
                    keywords: vec!["строительный контроль".to_string()],
                },
            ],
        };

        let yaml = serde_yaml::to_string(&sample)
            .map_err(|e| RagError::Index(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, yaml)
            .map_err(|e| RagError::Index(format!("Failed to write file: {}", e)))?;

        tracing::info!(path = %path.display(), "Created sample knowledge file");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::{EmbeddingConfig, SimpleEmbedder};
    use crate::memory_index::InMemoryIndex;
    use tempfile::tempdir;

    #[test]
    fn test_create_sample_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sample_knowledge.yaml");

        KnowledgeLoader::create_sample_file(&path).unwrap();

        let parsed = KnowledgeLoader::parse_file(&path).unwrap();
        assert_eq!(parsed.documents.len(), 2);
        assert_eq!(parsed.documents[0].document_number, "СП 70.13330.2012");
    }

    #[tokio::test]
    async fn test_load_directory_skips_bad_files() {
        let dir = tempdir().unwrap();
        KnowledgeLoader::create_sample_file(&dir.path().join("a.yaml")).unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"documents":[{"id":"sp63-10.3.1","document_title":"Бетонные и железобетонные конструкции","document_number":"СП 63.13330.2018","clause_number":"10.3.1","clause_text":"Толщина защитного слоя бетона"}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "documents: [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let index = InMemoryIndex::new(384);
        let count = KnowledgeLoader::load_directory(dir.path(), &index, &embedder)
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_directory_loads_nothing() {
        let dir = tempdir().unwrap();
        let embedder = SimpleEmbedder::new(EmbeddingConfig::default());
        let index = InMemoryIndex::new(384);
        let count = KnowledgeLoader::load_directory(&dir.path().join("absent"), &index, &embedder)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_clause_without_text_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(
            &path,
            "documents:\n  - id: x\n    document_title: T\n    document_number: N\n    clause_text: \"  \"\n",
        )
        .unwrap();
        assert!(KnowledgeLoader::parse_file(&path).is_err());
    }
}
