use bytepair::Tokenizer;

fn main() {
    let corpus = b"low low low lower lower lowest";

    let tok = Tokenizer::train(corpus, 300, 1);
    println!(
        "vocab {} ids ({} learned merges)",
        tok.vocab_size(),
        tok.merge_count()
    );

    let ids = tok.encode(b"low lower");
    println!("ids: {ids:?}");

    let bytes = tok.decode(&ids);
    println!("decoded: {}", String::from_utf8_lossy(&bytes));
}
