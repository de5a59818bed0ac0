// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Visitor pattern for AST traversal

use super::ExpressionNode;

/// Trait for visiting AST nodes
///
/// The default implementation walks every child; override
/// [`Visitor::visit`] and call [`walk`] to continue the descent.
pub trait Visitor {
    /// Visit an expression node
    fn visit(&mut self, node: &ExpressionNode) {
        walk(self, node);
    }
}

/// Visit the children of a node
pub fn walk<V: Visitor + ?Sized>(visitor: &mut V, node: &ExpressionNode) {
    for child in node.children() {
        visitor.visit(child);
    }
}
