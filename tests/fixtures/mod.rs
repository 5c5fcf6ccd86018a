//! Shared test data: a slice of the apparel taxonomy, queue payloads and
//! inference server replies.
#![allow(dead_code)]

/// Small apparel taxonomy in the published document layout.
pub const TAXONOMY_JSON: &str = r#"{
  "version": "2025-01",
  "verticals": [
    {
      "name": "Apparel & Accessories",
      "prefix": "aa",
      "categories": [
        {
          "id": "gid://shopify/TaxonomyCategory/aa",
          "level": 0,
          "name": "Apparel & Accessories",
          "children": [
            { "id": "gid://shopify/TaxonomyCategory/aa-1", "name": "Clothing" },
            { "id": "gid://shopify/TaxonomyCategory/aa-6", "name": "Jewelry" },
            { "id": "gid://shopify/TaxonomyCategory/aa-8", "name": "Shoes" }
          ]
        },
        {
          "id": "gid://shopify/TaxonomyCategory/aa-1",
          "level": 1,
          "name": "Clothing",
          "children": [
            { "id": "gid://shopify/TaxonomyCategory/aa-1-13", "name": "Clothing Tops" },
            { "id": "gid://shopify/TaxonomyCategory/aa-1-10", "name": "Outerwear" }
          ]
        },
        {
          "id": "gid://shopify/TaxonomyCategory/aa-1-13",
          "level": 2,
          "name": "Clothing Tops",
          "children": [
            { "id": "gid://shopify/TaxonomyCategory/aa-1-13-8", "name": "Shirts" },
            { "id": "gid://shopify/TaxonomyCategory/aa-1-13-9", "name": "T-Shirts" }
          ]
        },
        { "id": "gid://shopify/TaxonomyCategory/aa-1-13-8", "level": 3, "name": "Shirts", "children": [] },
        { "id": "gid://shopify/TaxonomyCategory/aa-1-13-9", "level": 3, "name": "T-Shirts", "children": [] },
        {
          "id": "gid://shopify/TaxonomyCategory/aa-1-10",
          "level": 2,
          "name": "Outerwear",
          "children": [
            { "id": "gid://shopify/TaxonomyCategory/aa-1-10-2", "name": "Coats & Jackets" }
          ]
        },
        { "id": "gid://shopify/TaxonomyCategory/aa-1-10-2", "level": 3, "name": "Coats & Jackets", "children": [] },
        {
          "id": "gid://shopify/TaxonomyCategory/aa-6",
          "level": 1,
          "name": "Jewelry",
          "children": [
            { "id": "gid://shopify/TaxonomyCategory/aa-6-11", "name": "Watches" }
          ]
        },
        { "id": "gid://shopify/TaxonomyCategory/aa-6-11", "level": 2, "name": "Watches", "children": [] },
        { "id": "gid://shopify/TaxonomyCategory/aa-8", "level": 1, "name": "Shoes", "children": [] }
      ]
    },
    {
      "name": "Home & Garden",
      "prefix": "hg",
      "categories": [
        { "id": "gid://shopify/TaxonomyCategory/hg", "level": 0, "name": "Home & Garden", "children": [] }
      ]
    }
  ]
}"#;

/// Model output that satisfies the grammar.
pub const VALID_OUTPUT: &str = r#"{"title": "Classic Oxford Shirt", "description": "Light blue cotton button-down with a chest pocket.", "taxonomy": "Apparel & Accessories > Clothing > Clothing Tops > Shirts"}"#;

pub fn product_job(record_id: i64, image_path: &str) -> String {
    serde_json::json!({
        "class": "ProductAnalysisJob",
        "args": [record_id, image_path],
        "jid": format!("jid-{record_id}"),
        "retry": true,
        "queue": "default"
    })
    .to_string()
}

pub fn other_job() -> String {
    serde_json::json!({
        "class": "OtherJob",
        "args": [1, "/img/1.jpg"],
        "jid": "jid-other"
    })
    .to_string()
}

/// Chat completion body carrying `content`.
pub fn chat_reply(content: &str, finish_reason: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": finish_reason
        }]
    })
    .to_string()
}
