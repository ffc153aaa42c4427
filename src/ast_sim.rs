//! AST-shape similarity for supported languages
//!
//! Parses a source file into its syntax tree, flattens the tree to a
//! preorder sequence of node-type labels, and compares two sequences by
//! longest-common-subsequence length normalized by mean sequence length.
//! Renaming identifiers or reshuffling literals does not change the
//! sequence, so structural copies score high even after cosmetic edits.
//!
//! Only Rust is currently parsed (`syn`); pairs outside the whitelist fall
//! back to token-fingerprint similarity alone.

use syn::visit::Visit;

/// Languages with an AST backend
pub const AST_LANGS: &[&str] = &["rust"];

/// Whether both languages of a pair support AST comparison
pub fn ast_supported(lang_a: &str, lang_b: &str) -> bool {
    AST_LANGS.contains(&lang_a) && lang_a == lang_b
}

/// Visitor that records a node-type label per syntax node, preorder
struct TypeSequence {
    labels: Vec<&'static str>,
}

impl<'ast> Visit<'ast> for TypeSequence {
    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        self.labels.push("ItemFn");
        syn::visit::visit_item_fn(self, node);
    }

    fn visit_item_struct(&mut self, node: &'ast syn::ItemStruct) {
        self.labels.push("ItemStruct");
        syn::visit::visit_item_struct(self, node);
    }

    fn visit_item_enum(&mut self, node: &'ast syn::ItemEnum) {
        self.labels.push("ItemEnum");
        syn::visit::visit_item_enum(self, node);
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        self.labels.push("ItemImpl");
        syn::visit::visit_item_impl(self, node);
    }

    fn visit_item_trait(&mut self, node: &'ast syn::ItemTrait) {
        self.labels.push("ItemTrait");
        syn::visit::visit_item_trait(self, node);
    }

    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        self.labels.push("ItemMod");
        syn::visit::visit_item_mod(self, node);
    }

    fn visit_expr(&mut self, node: &'ast syn::Expr) {
        self.labels.push(expr_label(node));
        syn::visit::visit_expr(self, node);
    }

    fn visit_stmt(&mut self, node: &'ast syn::Stmt) {
        let label = match node {
            syn::Stmt::Local(_) => "Local",
            syn::Stmt::Item(_) => "StmtItem",
            syn::Stmt::Expr(_, _) => "StmtExpr",
            syn::Stmt::Macro(_) => "StmtMacro",
        };
        self.labels.push(label);
        syn::visit::visit_stmt(self, node);
    }

    fn visit_pat(&mut self, node: &'ast syn::Pat) {
        self.labels.push("Pat");
        syn::visit::visit_pat(self, node);
    }

    fn visit_signature(&mut self, node: &'ast syn::Signature) {
        self.labels.push("Signature");
        syn::visit::visit_signature(self, node);
    }
}

fn expr_label(expr: &syn::Expr) -> &'static str {
    match expr {
        syn::Expr::Array(_) => "ExprArray",
        syn::Expr::Assign(_) => "ExprAssign",
        syn::Expr::Async(_) => "ExprAsync",
        syn::Expr::Await(_) => "ExprAwait",
        syn::Expr::Binary(_) => "ExprBinary",
        syn::Expr::Block(_) => "ExprBlock",
        syn::Expr::Break(_) => "ExprBreak",
        syn::Expr::Call(_) => "ExprCall",
        syn::Expr::Cast(_) => "ExprCast",
        syn::Expr::Closure(_) => "ExprClosure",
        syn::Expr::Continue(_) => "ExprContinue",
        syn::Expr::Field(_) => "ExprField",
        syn::Expr::ForLoop(_) => "ExprForLoop",
        syn::Expr::If(_) => "ExprIf",
        syn::Expr::Index(_) => "ExprIndex",
        syn::Expr::Let(_) => "ExprLet",
        syn::Expr::Lit(_) => "ExprLit",
        syn::Expr::Loop(_) => "ExprLoop",
        syn::Expr::Macro(_) => "ExprMacro",
        syn::Expr::Match(_) => "ExprMatch",
        syn::Expr::MethodCall(_) => "ExprMethodCall",
        syn::Expr::Paren(_) => "ExprParen",
        syn::Expr::Path(_) => "ExprPath",
        syn::Expr::Range(_) => "ExprRange",
        syn::Expr::Reference(_) => "ExprReference",
        syn::Expr::Return(_) => "ExprReturn",
        syn::Expr::Struct(_) => "ExprStruct",
        syn::Expr::Try(_) => "ExprTry",
        syn::Expr::Tuple(_) => "ExprTuple",
        syn::Expr::Unary(_) => "ExprUnary",
        syn::Expr::While(_) => "ExprWhile",
        _ => "Expr",
    }
}

/// Preorder node-type sequence for a Rust source file.
///
/// Unparseable content yields an empty sequence, which downstream treats
/// as "no AST evidence" rather than an error.
pub fn node_type_sequence(code: &str) -> Vec<&'static str> {
    let file = match syn::parse_file(code) {
        Ok(f) => f,
        Err(_) => return Vec::new(),
    };
    let mut seq = TypeSequence { labels: Vec::new() };
    seq.visit_file(&file);
    seq.labels
}

/// Classic DP longest common subsequence, O(n·m) with two rows
fn lcs_length(a: &[&str], b: &[&str]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            curr[j] = if a[i] == b[j] {
                1 + prev[j + 1]
            } else {
                prev[j].max(curr[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[0]
}

/// AST similarity of two Rust sources in [0, 1]
pub fn ast_similarity(code_a: &str, code_b: &str) -> f64 {
    let ta = node_type_sequence(code_a);
    let tb = node_type_sequence(code_b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let lcs = lcs_length(&ta, &tb) as f64;
    let denom = (ta.len() + tb.len()) as f64 / 2.0;
    if denom == 0.0 {
        0.0
    } else {
        lcs / denom
    }
}
