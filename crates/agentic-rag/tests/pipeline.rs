mod common;

use std::sync::Arc;

use agentic_rag::config::VectorDbConfig;
use agentic_rag::providers::{LocalVectorIndex, MemoryPassageStore, PassageStore, VectorIndex};
use agentic_rag::types::StoredPassage;
use agentic_rag::{AnswerOutcome, Document, Error};

use common::{
    fenced_answer, rag, rag_with, rag_with_store, CountingEmbedder, EagerFlushIndex,
    FailingPassageStore, HashEmbedder, StubLlm,
};

fn snapshot_config(dir: &tempfile::TempDir) -> VectorDbConfig {
    VectorDbConfig {
        storage_path: Some(dir.path().join("vectors.json")),
        ..VectorDbConfig::default()
    }
}

const COLOURS: &str = "The sky is blue. Grass is green.";
const SPACE: &str = "Rockets fly to orbit. Astronauts float in space.";

#[tokio::test]
async fn test_sky_and_grass_end_to_end() {
    let llm = Arc::new(StubLlm::new());
    let rag = rag(llm.clone());

    let passages = rag
        .add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();
    assert_eq!(passages.len(), 2);
    assert_eq!(passages[0].chunk_text, "The sky is blue.");
    assert_eq!(passages[1].chunk_text, "Grass is green.");
    assert_eq!(
        passages[1].text,
        "Facts about the colours of things.\n\nGrass is green."
    );
    assert_eq!(llm.contextualize_calls(), 2);

    let result = rag
        .contextual_search("what color is grass", 2, None)
        .await
        .unwrap();
    assert_eq!(result.passages.len(), 2);
    assert!(result.passages[0].text.ends_with("Grass is green."));
    assert_eq!(
        result.outcome.answer().map(|a| a.result.as_str()),
        Some("Grass is green.")
    );

    let prompts = llm.qa_prompts.lock();
    assert!(prompts[0].contains("what color is grass"));
    assert!(prompts[0].contains("Grass is green.\n\n"));
}

#[tokio::test]
async fn test_passage_store_failure_leaves_nothing_behind() {
    let llm = Arc::new(StubLlm::new());
    let store = Arc::new(FailingPassageStore::after(1));
    let rag = rag_with_store(llm, store.clone());

    let err = rag
        .add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Indexing { ref doc_id, .. } if doc_id == "colours"));

    assert_eq!(rag.providers().vector_index.len().await.unwrap(), 0);
    assert_eq!(store.len().await.unwrap(), 0);
    assert!(rag.audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_contextualization_failure_writes_nothing() {
    let llm = Arc::new(StubLlm::failing_contextualize());
    let rag = rag(llm);

    let err = rag
        .add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Indexing { .. }));
    assert_eq!(rag.providers().vector_index.len().await.unwrap(), 0);
    assert_eq!(rag.providers().passage_store.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_document_is_rejected() {
    let rag = rag(Arc::new(StubLlm::new()));
    let err = rag
        .add_document("empty", &Document::new("empty", "   \n "))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Indexing { .. }));
}

#[tokio::test]
async fn test_chunking_is_deterministic() {
    let rag = rag(Arc::new(StubLlm::new()));
    let text = format!("{} {}", COLOURS, SPACE);

    let first = rag.add_document("a", &Document::new("a", &text)).await.unwrap();
    let second = rag.add_document("b", &Document::new("b", &text)).await.unwrap();

    let chunks = |passages: &[agentic_rag::IndexedPassage]| {
        passages.iter().map(|p| p.chunk_text.clone()).collect::<Vec<_>>()
    };
    assert_eq!(chunks(&first), chunks(&second));
    assert!(first.iter().all(|p| !p.chunk_text.trim().is_empty()));
    assert!(first.iter().all(|p| p.document_id == "a"));
}

#[tokio::test]
async fn test_passage_retrieves_itself() {
    let rag = rag(Arc::new(StubLlm::new()));
    let mut all = rag
        .add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();
    all.extend(
        rag.add_document("space", &Document::new("space", SPACE))
            .await
            .unwrap(),
    );

    for passage in &all {
        let hits = rag.semantic_search(&passage.text, 1, None).await.unwrap();
        assert_eq!(hits[0].id, passage.id);
        assert!(hits[0].distance < 1e-4);

        let stored = rag.providers().passage_store.get(&passage.id).await.unwrap().unwrap();
        assert_eq!(stored.document_id, passage.document_id);
        assert_eq!(stored.text, passage.text);
    }
}

#[tokio::test]
async fn test_document_filter_is_applied_before_top_k() {
    let llm = Arc::new(StubLlm::new());
    let rag = rag(llm.clone());
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();
    rag.add_document("space", &Document::new("space", SPACE))
        .await
        .unwrap();

    let allowed = vec!["space".to_string()];
    let result = rag
        .contextual_search("what color is grass", 1, Some(&allowed))
        .await
        .unwrap();
    assert_eq!(result.passages.len(), 1);
    assert_eq!(result.passages[0].document_id, "space");

    let none: Vec<String> = Vec::new();
    let result = rag
        .contextual_search("what color is grass", 5, Some(&none))
        .await
        .unwrap();
    assert!(result.passages.is_empty());
}

#[tokio::test]
async fn test_malformed_answers_are_retried() {
    let llm = Arc::new(StubLlm::new().with_qa_replies(&[
        "The answer is green.",
        "```json\n{\"result\": oops}\n```",
        &fenced_answer("Green."),
    ]));
    let rag = rag(llm.clone());
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();

    let result = rag.search("what color is grass", None).await.unwrap();
    assert_eq!(result.outcome.answer().unwrap().result, "Green.");
    assert_eq!(llm.qa_calls(), 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let llm = Arc::new(StubLlm::new().with_default_qa("no json here"));
    let rag = rag(llm.clone());
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();

    let result = rag.search("what color is grass", None).await.unwrap();
    assert_eq!(result.outcome, AnswerOutcome::NoAnswer { attempts: 4 });
    assert_eq!(llm.qa_calls(), 4);
    assert_eq!(result.passages.len(), 2);
}

#[tokio::test]
async fn test_raw_json_answer_is_accepted() {
    let llm = Arc::new(
        StubLlm::new().with_default_qa("{\"result\": \"Blue.\", \"is_chat_false\": \"false\"}"),
    );
    let rag = rag(llm.clone());
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();

    let result = rag.search("what color is the sky", None).await.unwrap();
    let answer = result.outcome.answer().unwrap();
    assert_eq!(answer.result, "Blue.");
    assert!(!answer.is_chat_false);
    assert_eq!(llm.qa_calls(), 1);
}

#[tokio::test]
async fn test_search_before_indexing_still_answers() {
    let llm = Arc::new(StubLlm::new());
    let rag = rag(llm.clone());
    let result = rag.search("anything", None).await.unwrap();
    assert!(result.passages.is_empty());
    assert!(result.outcome.is_answered());
}

#[tokio::test]
async fn test_delete_document_clears_both_stores() {
    let rag = rag(Arc::new(StubLlm::new()));
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();
    rag.add_document("space", &Document::new("space", SPACE))
        .await
        .unwrap();

    assert_eq!(rag.delete_document("colours").await.unwrap(), 2);
    assert_eq!(rag.providers().vector_index.len().await.unwrap(), 2);
    assert_eq!(rag.providers().passage_store.len().await.unwrap(), 2);
    assert!(rag.audit().await.unwrap().is_consistent());
}

#[tokio::test]
async fn test_audit_and_repair_orphans() {
    let store = Arc::new(MemoryPassageStore::new());
    let rag = rag_with_store(Arc::new(StubLlm::new()), store.clone());
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();

    store
        .put(&StoredPassage {
            id: "orphan-passage".to_string(),
            document_id: "ghost".to_string(),
            text: "Nobody indexed me.".to_string(),
            embedding: Vec::new(),
        })
        .await
        .unwrap();
    rag.providers()
        .vector_index
        .upsert("orphan-vector", "ghost", &HashEmbedder::vector("lost vector"))
        .await
        .unwrap();

    let report = rag.audit().await.unwrap();
    assert_eq!(report.orphan_passages, vec!["orphan-passage".to_string()]);
    assert_eq!(report.orphan_vectors, vec!["orphan-vector".to_string()]);
    assert!(report.document_mismatches.is_empty());

    rag.repair().await.unwrap();
    assert!(rag.audit().await.unwrap().is_consistent());
    assert_eq!(store.len().await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_indexing_with_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let config = snapshot_config(&dir);
    let index = Arc::new(LocalVectorIndex::open(&config).unwrap());
    let store = Arc::new(MemoryPassageStore::new());
    let rag = Arc::new(rag_with(
        Arc::new(StubLlm::new()),
        Arc::new(HashEmbedder),
        index,
        store.clone(),
    ));

    let tasks: Vec<_> = (0..12)
        .map(|i| {
            let rag = Arc::clone(&rag);
            tokio::spawn(async move {
                let doc_id = format!("doc-{}", i);
                let text = format!("Document {} mentions river {}. {}", i, i, COLOURS);
                rag.add_document(&doc_id, &Document::new(doc_id.clone(), text))
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(!task.await.unwrap().unwrap().is_empty());
    }

    assert!(rag.audit().await.unwrap().is_consistent());
    let reopened = LocalVectorIndex::open(&config).unwrap();
    assert_eq!(
        reopened.len().await.unwrap(),
        store.len().await.unwrap()
    );
}

#[tokio::test]
async fn test_rollback_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let config = snapshot_config(&dir);
    let index = Arc::new(EagerFlushIndex(LocalVectorIndex::open(&config).unwrap()));
    let store = Arc::new(FailingPassageStore::after(1));
    let rag = rag_with(
        Arc::new(StubLlm::new()),
        Arc::new(HashEmbedder),
        index,
        store,
    );

    assert!(rag
        .add_document("colours", &Document::new("colours", COLOURS))
        .await
        .is_err());

    let reopened = LocalVectorIndex::open(&config).unwrap();
    assert_eq!(reopened.len().await.unwrap(), 0);
}

#[tokio::test]
async fn test_search_embeds_only_the_query() {
    let embedder = Arc::new(CountingEmbedder::default());
    let rag = rag_with(
        Arc::new(StubLlm::new()),
        embedder.clone(),
        Arc::new(LocalVectorIndex::in_memory("collection")),
        Arc::new(MemoryPassageStore::new()),
    );
    rag.add_document("colours", &Document::new("colours", COLOURS))
        .await
        .unwrap();
    rag.add_document("space", &Document::new("space", SPACE))
        .await
        .unwrap();

    let before = embedder.count();
    let result = rag.search("what color is grass", None).await.unwrap();
    assert_eq!(result.passages.len(), 2);
    assert!(result.passages[0].text.ends_with("Grass is green."));
    assert_eq!(embedder.count() - before, 1);
}
