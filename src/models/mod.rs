// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table (PostgreSQL en prod, SQLite en test) avec SeaORM.
//
// Liste des modules:
//   - enums : Statuts de commande/paiement, moyens de paiement, types de coupon
//   - health : Health check API
//   - product : Catalogue (prix, prix soldé, stock)
//   - cart_item : Lignes de panier par utilisateur
//   - coupon : Codes de réduction (pourcentage ou montant fixe)
//   - wallet : Solde prépayé par utilisateur (un seul wallet par user)
//   - wallet_transaction : Journal append-only des mouvements du wallet
//   - order : Commandes (montants figés, adresses en JSON)
//   - order_item : Lignes de commande (snapshot du produit)
//   - dto : Data Transfer Objects pour les requêtes/réponses API
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les montants sont des Decimal, jamais des f64
//   - order_items.product_id n'a pas de clé étrangère : la ligne survit au produit
//
// ============================================================================

pub mod enums;
pub mod health;
pub mod product;
pub mod cart_item;
pub mod coupon;
pub mod wallet;
pub mod wallet_transaction;
pub mod order;
pub mod order_item;
pub mod dto;
